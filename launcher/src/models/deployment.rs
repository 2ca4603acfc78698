//! Deployment models

use api_models::{DeploymentView, LogEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use api_models::{DeploymentStatus, LogStatus};

/// A deployment of the bot onto a user's fork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: String,

    /// Session identifier embedded into the bot configuration
    pub session_id: String,

    /// Branch created for this deployment
    pub branch_name: Option<String>,

    /// GitHub login owning the deployment
    pub github_login: String,

    /// Name of the fork the bot is deployed from
    pub repo_name: String,

    /// Current status
    pub status: DeploymentStatus,

    /// Human readable status message
    pub message: String,

    /// Link to the fork's Actions page
    pub workflow_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Browser facing view; the session identifier never leaves the server
    pub fn to_view(&self) -> DeploymentView {
        DeploymentView {
            id: self.id.clone(),
            branch_name: self.branch_name.clone(),
            github_username: self.github_login.clone(),
            repo_name: self.repo_name.clone(),
            status: self.status,
            message: self.message.clone(),
            workflow_url: self.workflow_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Fields needed to create a deployment
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub session_id: String,
    pub branch_name: Option<String>,
    pub github_login: String,
    pub repo_name: String,
}

/// Status update applied to an existing deployment
///
/// Unset optional fields keep their current value.
#[derive(Debug, Clone)]
pub struct DeploymentStatusUpdate {
    pub status: DeploymentStatus,
    pub message: String,
    pub branch_name: Option<String>,
    pub repo_name: Option<String>,
    pub workflow_url: Option<String>,
}

impl DeploymentStatusUpdate {
    pub fn new(status: DeploymentStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            branch_name: None,
            repo_name: None,
            workflow_url: None,
        }
    }

    pub fn with_branch(mut self, branch_name: impl Into<String>) -> Self {
        self.branch_name = Some(branch_name.into());
        self
    }

    pub fn with_repo(mut self, repo_name: impl Into<String>) -> Self {
        self.repo_name = Some(repo_name.into());
        self
    }

    pub fn with_workflow_url(mut self, workflow_url: impl Into<String>) -> Self {
        self.workflow_url = Some(workflow_url.into());
        self
    }
}

/// A step level log entry of a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentLog {
    pub id: String,
    pub deployment_id: String,
    pub step: String,
    pub status: LogStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentLog {
    pub fn to_entry(&self) -> LogEntry {
        LogEntry {
            id: self.id.clone(),
            step: self.step.clone(),
            status: self.status,
            message: self.message.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Fields needed to append a log entry
#[derive(Debug, Clone)]
pub struct NewDeploymentLog {
    pub deployment_id: String,
    pub step: String,
    pub status: LogStatus,
    pub message: String,
}

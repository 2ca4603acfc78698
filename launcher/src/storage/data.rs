//! Store contents shared by the store implementations

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::LauncherError;
use crate::models::deployment::{
    Deployment, DeploymentLog, DeploymentStatus, DeploymentStatusUpdate, NewDeployment,
    NewDeploymentLog,
};
use crate::models::user::User;
use crate::utils::generate_uuid;

/// Everything a store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub users: HashMap<String, User>,

    #[serde(default)]
    pub deployments: HashMap<String, Deployment>,

    /// Logs per deployment ID, in insertion order
    #[serde(default)]
    pub logs: HashMap<String, Vec<DeploymentLog>>,
}

impl StoreData {
    pub fn upsert_user(&mut self, login: &str) -> User {
        let now = Utc::now();
        let user = self.users.entry(login.to_string()).or_insert_with(|| User {
            login: login.to_string(),
            credential: String::new(),
            created_at: now,
            last_login_at: now,
        });
        user.last_login_at = now;
        user.clone()
    }

    pub fn create_deployment(&mut self, new: NewDeployment) -> Deployment {
        let now = Utc::now();
        let deployment = Deployment {
            id: generate_uuid(),
            session_id: new.session_id,
            branch_name: new.branch_name,
            github_login: new.github_login,
            repo_name: new.repo_name,
            status: DeploymentStatus::Pending,
            message: "Deployment created".to_string(),
            workflow_url: None,
            created_at: now,
            updated_at: now,
        };
        self.deployments
            .insert(deployment.id.clone(), deployment.clone());
        deployment
    }

    pub fn list_deployments(&self, github_login: &str) -> Vec<Deployment> {
        let mut deployments: Vec<Deployment> = self
            .deployments
            .values()
            .filter(|d| d.github_login == github_login)
            .cloned()
            .collect();
        deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        deployments
    }

    pub fn update_deployment_status(
        &mut self,
        id: &str,
        update: DeploymentStatusUpdate,
    ) -> Result<Deployment, LauncherError> {
        let deployment = self
            .deployments
            .get_mut(id)
            .ok_or_else(|| LauncherError::NotFound(format!("Deployment {} not found", id)))?;

        deployment.status = update.status;
        deployment.message = update.message;
        if let Some(branch_name) = update.branch_name {
            deployment.branch_name = Some(branch_name);
        }
        if let Some(repo_name) = update.repo_name {
            deployment.repo_name = repo_name;
        }
        if let Some(workflow_url) = update.workflow_url {
            deployment.workflow_url = Some(workflow_url);
        }
        deployment.updated_at = Utc::now().max(deployment.updated_at);

        Ok(deployment.clone())
    }

    pub fn append_log(&mut self, new: NewDeploymentLog) -> Result<DeploymentLog, LauncherError> {
        if !self.deployments.contains_key(&new.deployment_id) {
            return Err(LauncherError::NotFound(format!(
                "Deployment {} not found",
                new.deployment_id
            )));
        }

        let logs = self.logs.entry(new.deployment_id.clone()).or_default();

        // Never let a clock step backwards reorder the log
        let mut timestamp = Utc::now();
        if let Some(last) = logs.last() {
            timestamp = timestamp.max(last.timestamp);
        }

        let log = DeploymentLog {
            id: generate_uuid(),
            deployment_id: new.deployment_id,
            step: new.step,
            status: new.status,
            message: new.message,
            timestamp,
        };
        logs.push(log.clone());
        Ok(log)
    }

    pub fn list_logs(&self, deployment_id: &str) -> Vec<DeploymentLog> {
        let mut logs = self.logs.get(deployment_id).cloned().unwrap_or_default();
        logs.sort_by_key(|l| l.timestamp);
        logs
    }
}

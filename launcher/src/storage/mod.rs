//! Deployment and log record storage
//!
//! Handlers and workers only see [`DeploymentStore`]. [`memory::MemoryStore`] keeps
//! everything in process memory; [`file::FileStore`] additionally persists each
//! mutation to a JSON document.

pub mod data;
pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::errors::LauncherError;
use crate::models::deployment::{
    Deployment, DeploymentLog, DeploymentStatusUpdate, NewDeployment, NewDeploymentLog,
};
use crate::models::user::User;

/// Record store for users, deployments and deployment logs
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Create the user on first login, refresh `last_login_at` afterwards
    async fn upsert_user(&self, login: &str) -> Result<User, LauncherError>;

    /// Create a deployment in `pending` state
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, LauncherError>;

    async fn get_deployment(&self, id: &str) -> Result<Option<Deployment>, LauncherError>;

    /// Deployments owned by `github_login`, newest first
    async fn list_deployments(&self, github_login: &str) -> Result<Vec<Deployment>, LauncherError>;

    async fn update_deployment_status(
        &self,
        id: &str,
        update: DeploymentStatusUpdate,
    ) -> Result<Deployment, LauncherError>;

    /// Append a log entry; fails with `NotFound` for an unknown deployment
    async fn append_log(&self, new: NewDeploymentLog) -> Result<DeploymentLog, LauncherError>;

    /// Logs of a deployment ordered by timestamp
    async fn list_logs(&self, deployment_id: &str) -> Result<Vec<DeploymentLog>, LauncherError>;
}

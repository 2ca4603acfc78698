//! In-memory deployment store

use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::LauncherError;
use crate::models::deployment::{
    Deployment, DeploymentLog, DeploymentStatusUpdate, NewDeployment, NewDeploymentLog,
};
use crate::models::user::User;
use crate::storage::data::StoreData;
use crate::storage::DeploymentStore;

/// Store that forgets everything on restart
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn upsert_user(&self, login: &str) -> Result<User, LauncherError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        Ok(data.upsert_user(login))
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, LauncherError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        Ok(data.create_deployment(new))
    }

    async fn get_deployment(&self, id: &str) -> Result<Option<Deployment>, LauncherError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.deployments.get(id).cloned())
    }

    async fn list_deployments(&self, github_login: &str) -> Result<Vec<Deployment>, LauncherError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.list_deployments(github_login))
    }

    async fn update_deployment_status(
        &self,
        id: &str,
        update: DeploymentStatusUpdate,
    ) -> Result<Deployment, LauncherError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.update_deployment_status(id, update)
    }

    async fn append_log(&self, new: NewDeploymentLog) -> Result<DeploymentLog, LauncherError> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.append_log(new)
    }

    async fn list_logs(&self, deployment_id: &str) -> Result<Vec<DeploymentLog>, LauncherError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.list_logs(deployment_id))
    }
}

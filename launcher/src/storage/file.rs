//! JSON file backed deployment store

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::LauncherError;
use crate::filesys::file::File;
use crate::models::deployment::{
    Deployment, DeploymentLog, DeploymentStatusUpdate, NewDeployment, NewDeploymentLog,
};
use crate::models::user::User;
use crate::storage::data::StoreData;
use crate::storage::DeploymentStore;

/// Store that rewrites a JSON document after every mutation
pub struct FileStore {
    file: File,
    data: Mutex<StoreData>,
}

impl FileStore {
    /// Open the store, loading existing records when the file is present
    pub async fn open(file: File) -> Result<Self, LauncherError> {
        let data = if file.exists().await {
            let data: StoreData = file.read_json().await.map_err(|e| {
                LauncherError::StorageError(format!(
                    "Unable to load {}: {}",
                    file.path().display(),
                    e
                ))
            })?;
            info!(
                "Loaded {} deployments from {}",
                data.deployments.len(),
                file.path().display()
            );
            data
        } else {
            info!("Creating new store at {}", file.path().display());
            StoreData::default()
        };

        Ok(Self {
            file,
            data: Mutex::new(data),
        })
    }

    async fn persist(&self, data: &StoreData) -> Result<(), LauncherError> {
        debug!("Persisting store to {}", self.file.path().display());
        self.file
            .write_json_atomic(data)
            .await
            .map_err(|e| LauncherError::StorageError(e.to_string()))
    }
}

#[async_trait]
impl DeploymentStore for FileStore {
    async fn upsert_user(&self, login: &str) -> Result<User, LauncherError> {
        let mut data = self.data.lock().await;
        let user = data.upsert_user(login);
        self.persist(&data).await?;
        Ok(user)
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, LauncherError> {
        let mut data = self.data.lock().await;
        let deployment = data.create_deployment(new);
        self.persist(&data).await?;
        Ok(deployment)
    }

    async fn get_deployment(&self, id: &str) -> Result<Option<Deployment>, LauncherError> {
        let data = self.data.lock().await;
        Ok(data.deployments.get(id).cloned())
    }

    async fn list_deployments(&self, github_login: &str) -> Result<Vec<Deployment>, LauncherError> {
        let data = self.data.lock().await;
        Ok(data.list_deployments(github_login))
    }

    async fn update_deployment_status(
        &self,
        id: &str,
        update: DeploymentStatusUpdate,
    ) -> Result<Deployment, LauncherError> {
        let mut data = self.data.lock().await;
        let deployment = data.update_deployment_status(id, update)?;
        self.persist(&data).await?;
        Ok(deployment)
    }

    async fn append_log(&self, new: NewDeploymentLog) -> Result<DeploymentLog, LauncherError> {
        let mut data = self.data.lock().await;
        let log = data.append_log(new)?;
        self.persist(&data).await?;
        Ok(log)
    }

    async fn list_logs(&self, deployment_id: &str) -> Result<Vec<DeploymentLog>, LauncherError> {
        let data = self.data.lock().await;
        Ok(data.list_logs(deployment_id))
    }
}

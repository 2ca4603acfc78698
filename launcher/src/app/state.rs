//! Application state management

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::LauncherError;
use crate::filesys::file::File;
use crate::github::oauth::OAuthApp;
use crate::github::GitHubApi;
use crate::relay::RelayHub;
use crate::server::state::ServerState;
use crate::session::SessionStore;
use crate::storage::file::FileStore;
use crate::storage::memory::MemoryStore;
use crate::storage::DeploymentStore;

/// Main application state
pub struct AppState {
    /// Users, deployments and logs
    pub store: Arc<dyn DeploymentStore>,

    /// GitHub API endpoints
    pub github: GitHubApi,

    /// Browser sessions
    pub sessions: Arc<SessionStore>,

    /// Live log fan-out
    pub relay: Arc<RelayHub>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, LauncherError> {
        info!("Initializing application state...");

        let store: Arc<dyn DeploymentStore> = match &options.data_file {
            Some(path) => {
                info!("Storing deployments in {}", path.display());
                Arc::new(FileStore::open(File::new(path)).await?)
            }
            None => {
                info!("Storing deployments in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let github = GitHubApi::new(&options.github.api_url, &options.github.oauth_url)?;

        let sessions = Arc::new(SessionStore::new(
            &options.session.secret,
            options.session.ttl,
            options.session.secure_cookie,
        ));

        let relay = Arc::new(RelayHub::new(options.relay.clone(), store.clone()));

        Ok(Self {
            store,
            github,
            sessions,
            relay,
        })
    }

    /// State handed to the HTTP server
    pub fn server_state(&self, options: &AppOptions) -> ServerState {
        ServerState::new(
            self.store.clone(),
            self.github.clone(),
            OAuthApp {
                client_id: options.github.client_id.clone(),
                client_secret: SecretString::from(
                    options.github.client_secret.expose_secret().to_string(),
                ),
                redirect_uri: options.github.redirect_uri.clone(),
            },
            self.sessions.clone(),
            self.relay.clone(),
            options.deploy.clone(),
            options.frontend_url.clone(),
        )
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), LauncherError> {
        info!("Shutting down application state...");
        self.relay.shutdown();
        Ok(())
    }
}

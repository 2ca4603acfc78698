//! Server state

use std::sync::Arc;

use axum::extract::FromRef;

use crate::deploy::DeployOptions;
use crate::github::oauth::OAuthApp;
use crate::github::GitHubApi;
use crate::relay::RelayHub;
use crate::session::SessionStore;
use crate::storage::DeploymentStore;

/// Server state shared across handlers
pub struct ServerState {
    pub store: Arc<dyn DeploymentStore>,
    pub github: GitHubApi,
    pub oauth: OAuthApp,
    pub sessions: Arc<SessionStore>,
    pub relay: Arc<RelayHub>,
    pub deploy_options: DeployOptions,
    /// Where the browser lands after the OAuth callback
    pub frontend_url: String,
}

impl ServerState {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        github: GitHubApi,
        oauth: OAuthApp,
        sessions: Arc<SessionStore>,
        relay: Arc<RelayHub>,
        deploy_options: DeployOptions,
        frontend_url: String,
    ) -> Self {
        Self {
            store,
            github,
            oauth,
            sessions,
            relay,
            deploy_options,
            frontend_url,
        }
    }
}

impl FromRef<ServerState> for Arc<SessionStore> {
    fn from_ref(state: &ServerState) -> Self {
        Arc::clone(&state.sessions)
    }
}

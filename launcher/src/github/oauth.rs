//! GitHub OAuth authorization-code flow

use github_models::{AccessTokenRequest, AccessTokenResponse};
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use url::Url;

use crate::errors::LauncherError;
use crate::github::client::GitHubApi;

/// Scopes needed to fork, push workflow files and dispatch runs
pub const OAUTH_SCOPES: &str = "repo workflow";

/// Registered GitHub OAuth app
#[derive(Debug)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Option<String>,
}

impl OAuthApp {
    /// URL the browser is sent to for consent
    pub fn authorize_url(&self, api: &GitHubApi, state: &str) -> Result<String, LauncherError> {
        let mut url = Url::parse(&format!("{}/login/oauth/authorize", api.oauth_url()))
            .map_err(|e| LauncherError::ConfigError(format!("Invalid OAuth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            if let Some(redirect_uri) = &self.redirect_uri {
                query.append_pair("redirect_uri", redirect_uri);
            }
            query.append_pair("scope", OAUTH_SCOPES);
            query.append_pair("state", state);
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(
        &self,
        api: &GitHubApi,
        code: &str,
    ) -> Result<SecretString, LauncherError> {
        let url = format!("{}/login/oauth/access_token", api.oauth_url());
        debug!("POST {} (code exchange)", url);

        let body = AccessTokenRequest {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.expose_secret().to_string(),
            code: code.to_string(),
            redirect_uri: self.redirect_uri.clone(),
        };

        let response = api
            .http()
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("OAuth code exchange failed: {} - {}", status, text);
            return Err(LauncherError::AuthError(format!(
                "GitHub rejected the authorization code ({})",
                status
            )));
        }

        let token: AccessTokenResponse = response.json().await?;
        if let Some(error) = token.error {
            let description = token.error_description.unwrap_or_else(|| error.clone());
            warn!("OAuth code exchange returned error: {}", error);
            return Err(LauncherError::AuthError(description));
        }

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| LauncherError::AuthError("GitHub returned no access token".to_string()))
    }
}

//! GitHub REST client
//!
//! Every request is authenticated with the user's OAuth token. A 404 answer is
//! reported as `Ok(None)` so callers can treat it as "resource absent"; any
//! other non-2xx answer becomes [`LauncherError::GitHubError`].

use std::time::Duration;

use github_models::ErrorResponse;
use reqwest::{header, Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::LauncherError;

const API_VERSION: &str = "2022-11-28";

/// Shared HTTP state for talking to GitHub
#[derive(Debug, Clone)]
pub struct GitHubApi {
    http: Client,
    api_url: String,
    oauth_url: String,
}

impl GitHubApi {
    /// Create a new API handle
    pub fn new(api_url: &str, oauth_url: &str) -> Result<Self, LauncherError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("xylo-launcher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            oauth_url: oauth_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL of the OAuth endpoints
    pub fn oauth_url(&self) -> &str {
        &self.oauth_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Client acting on behalf of the owner of `token`
    pub fn client(&self, token: &str) -> GitHubClient {
        GitHubClient {
            http: self.http.clone(),
            base_url: self.api_url.clone(),
            token: SecretString::from(token.to_string()),
        }
    }
}

/// Authenticated GitHub REST client
pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl GitHubClient {
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<Response>, LauncherError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token.expose_secret()),
            )
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!("{} {} -> 404", method, url);
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            error!("GitHub {} {} failed: {} - {}", method, url, status, message);
            return Err(LauncherError::GitHubError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(response))
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, LauncherError> {
        match self.send::<()>(Method::GET, path, None).await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, LauncherError> {
        match self.send(Method::POST, path, Some(body)).await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, LauncherError> {
        match self.send(Method::PUT, path, Some(body)).await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    /// Make a POST request whose answer carries no body (204)
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<()>, LauncherError> {
        Ok(self.send(Method::POST, path, Some(body)).await?.map(|_| ()))
    }

    /// Make a PUT request whose answer carries no body (204)
    pub async fn put_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<()>, LauncherError> {
        Ok(self.send(Method::PUT, path, Some(body)).await?.map(|_| ()))
    }
}

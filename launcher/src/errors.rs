//! Error types for the Xylo launcher

use api_models::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Main error type for the Xylo launcher
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Session token error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// GitHub refused an operation because of repository settings
    #[error("Permission error: {0}")]
    PermissionError(String),

    /// Any non-2xx, non-404 answer from GitHub
    #[error("GitHub API error ({status}): {message}")]
    GitHubError { status: u16, message: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for LauncherError {
    fn from(err: anyhow::Error) -> Self {
        LauncherError::Internal(err.to_string())
    }
}

impl LauncherError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LauncherError::AuthError(_) | LauncherError::TokenError(_) => StatusCode::UNAUTHORIZED,
            LauncherError::NotFound(_) => StatusCode::NOT_FOUND,
            LauncherError::Conflict(_) => StatusCode::CONFLICT,
            LauncherError::ValidationError(_) => StatusCode::BAD_REQUEST,
            LauncherError::PermissionError(_) => StatusCode::FORBIDDEN,
            LauncherError::GitHubError { .. } | LauncherError::HttpError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            LauncherError::AuthError(_) | LauncherError::TokenError(_) => "unauthenticated",
            LauncherError::NotFound(_) => "not_found",
            LauncherError::Conflict(_) => "conflict",
            LauncherError::ValidationError(_) => "bad_request",
            LauncherError::PermissionError(_) => "permission_denied",
            LauncherError::GitHubError { .. } | LauncherError::HttpError(_) => "upstream_error",
            _ => "internal_error",
        }
    }

    /// Message safe to show to the browser
    pub fn user_message(&self) -> String {
        match self {
            LauncherError::AuthError(msg)
            | LauncherError::NotFound(msg)
            | LauncherError::Conflict(msg)
            | LauncherError::ValidationError(msg)
            | LauncherError::PermissionError(msg) => msg.clone(),
            LauncherError::TokenError(_) => "Authentication required".to_string(),
            LauncherError::GitHubError { status, message } => {
                format!("GitHub API error ({}): {}", status, message)
            }
            LauncherError::HttpError(_) => "Failed to reach GitHub".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for LauncherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

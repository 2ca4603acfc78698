//! GitHub OAuth endpoints

use std::sync::Arc;

use api_models::{AuthStatusResponse, SuccessResponse, UserInfo};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::LauncherError;
use crate::server::state::ServerState;
use crate::session::MaybeSession;
use crate::utils::generate_uuid;

/// Query of the OAuth callback
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Start the OAuth flow: remember a fresh `state` and redirect to GitHub
pub async fn github_login_handler(
    State(state): State<Arc<ServerState>>,
    MaybeSession(session): MaybeSession,
) -> Result<impl IntoResponse, LauncherError> {
    let session_id = match session {
        Some(id) => id,
        None => state.sessions.create().await,
    };

    let oauth_state = generate_uuid();
    state
        .sessions
        .set_oauth_state(&session_id, &oauth_state)
        .await?;
    let location = state.oauth.authorize_url(&state.github, &oauth_state)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, header_value(&location)?);
    headers.insert(
        header::SET_COOKIE,
        state.sessions.session_cookie(&session_id)?,
    );
    Ok((StatusCode::FOUND, headers))
}

/// Finish the OAuth flow and send the browser back to the frontend
pub async fn github_callback_handler(
    State(state): State<Arc<ServerState>>,
    MaybeSession(session): MaybeSession,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, LauncherError> {
    if let Some(error) = params.error {
        warn!("GitHub denied authorization: {}", error);
        return Err(LauncherError::AuthError(
            params.error_description.unwrap_or(error),
        ));
    }

    let session_id = session
        .ok_or_else(|| LauncherError::AuthError("Login session expired".to_string()))?;
    let expected = state.sessions.take_oauth_state(&session_id).await;
    match (expected, params.state) {
        (Some(expected), Some(given)) if expected == given => {}
        _ => {
            return Err(LauncherError::AuthError(
                "Invalid OAuth state".to_string(),
            ))
        }
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LauncherError::AuthError("Missing authorization code".to_string()))?;

    let token = state.oauth.exchange_code(&state.github, &code).await?;
    let user = state
        .github
        .client(token.expose_secret())
        .get_authenticated_user()
        .await?;

    state.store.upsert_user(&user.login).await?;
    state
        .sessions
        .authenticate(&session_id, &user.login, token)
        .await?;
    info!("User {} logged in", user.login);

    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, header_value(&state.frontend_url)?);
    headers.insert(
        header::SET_COOKIE,
        state.sessions.session_cookie(&session_id)?,
    );
    Ok((StatusCode::FOUND, headers))
}

/// Whether the browser has an authenticated session
pub async fn auth_status_handler(
    State(state): State<Arc<ServerState>>,
    MaybeSession(session): MaybeSession,
) -> Json<AuthStatusResponse> {
    let login = match session {
        Some(id) => state.sessions.login(&id).await,
        None => None,
    };

    Json(AuthStatusResponse {
        authenticated: login.is_some(),
        user: login.map(|login| UserInfo { login }),
    })
}

/// Drop the session and expire its cookie
pub async fn logout_handler(
    State(state): State<Arc<ServerState>>,
    MaybeSession(session): MaybeSession,
) -> impl IntoResponse {
    if let Some(id) = session {
        state.sessions.remove(&id).await;
    }

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, state.sessions.expired_cookie());
    (
        headers,
        Json(SuccessResponse {
            success: true,
            message: "Logged out".to_string(),
        }),
    )
}

fn header_value(value: &str) -> Result<HeaderValue, LauncherError> {
    HeaderValue::from_str(value)
        .map_err(|e| LauncherError::Internal(format!("Invalid header value: {}", e)))
}

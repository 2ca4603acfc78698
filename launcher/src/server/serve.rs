//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::Url;

use crate::app::options::ServerOptions;
use crate::errors::LauncherError;
use crate::server::auth::{
    auth_status_handler, github_callback_handler, github_login_handler, logout_handler,
};
use crate::server::handlers::{
    deploy_handler, deployment_handler, deployment_logs_handler, deployments_handler,
    health_handler, repository_setup_handler, version_handler, workflow_verify_handler,
};
use crate::server::socket::socket_handler;
use crate::server::state::ServerState;

/// Build the application router
pub fn router(state: Arc<ServerState>, cors_origin: Option<&str>) -> Router {
    let router = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // OAuth
        .route("/api/auth/github", get(github_login_handler))
        .route("/api/auth/github/callback", get(github_callback_handler))
        .route("/api/auth/status", get(auth_status_handler))
        .route("/api/auth/logout", post(logout_handler))
        // Fork and workflow
        .route("/api/repository/setup", post(repository_setup_handler))
        .route("/api/workflow/verify", get(workflow_verify_handler))
        // Deployments
        .route("/api/deploy", post(deploy_handler))
        .route("/api/deployments", get(deployments_handler))
        .route("/api/deployments/{id}", get(deployment_handler))
        .route("/api/deployments/{id}/logs", get(deployment_logs_handler))
        // Live logs
        .route("/ws", get(socket_handler))
        // State and middleware
        .with_state(state);

    let router = match cors_origin.and_then(cors_layer) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// CORS for a frontend served from another origin; cookies must cross with it
fn cors_layer(frontend_url: &str) -> Option<CorsLayer> {
    let url = Url::parse(frontend_url).ok()?;
    let origin = url.origin().ascii_serialization();
    let origin = match HeaderValue::from_str(&origin) {
        Ok(origin) => origin,
        Err(e) => {
            warn!("Ignoring frontend origin {}: {}", origin, e);
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), LauncherError>>, LauncherError> {
    let app = router(state, options.cors_origin.as_deref());

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LauncherError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| LauncherError::ServerError(e.to_string()))
    });

    Ok(handle)
}

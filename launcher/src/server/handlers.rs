//! HTTP request handlers

use std::sync::Arc;

use api_models::{
    DeployRequest, DeployResponse, DeploymentListResponse, DeploymentLogsResponse,
    DeploymentView, HealthResponse, RepositorySetupResponse, VersionResponse,
    WorkflowVerifyResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info};

use crate::deploy::fork;
use crate::deploy::Orchestrator;
use crate::errors::LauncherError;
use crate::models::deployment::{Deployment, NewDeployment};
use crate::server::state::ServerState;
use crate::session::AuthSession;
use crate::utils::{validate_branch_name, version_info};

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "xylo-launcher".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Fork the upstream repository for the session's user; idempotent
pub async fn repository_setup_handler(
    State(state): State<Arc<ServerState>>,
    auth: AuthSession,
) -> Result<Json<RepositorySetupResponse>, LauncherError> {
    let github = auth.github(&state.github);
    let fork = fork::ensure_fork(&github, &state.deploy_options, &auth.login).await?;

    if fork.created {
        info!("Created fork {} for {}", fork.repo.full_name, auth.login);
    }

    Ok(Json(RepositorySetupResponse {
        success: true,
        repo_name: fork.repo.name,
        repo_url: fork.repo.html_url,
        created: fork.created,
    }))
}

/// Report whether the fork exists and may run workflows
pub async fn workflow_verify_handler(
    State(state): State<Arc<ServerState>>,
    auth: AuthSession,
) -> Result<Json<WorkflowVerifyResponse>, LauncherError> {
    let github = auth.github(&state.github);
    let repo_name = &state.deploy_options.repo;

    let Some(repo) = github.get_repository(&auth.login, repo_name).await? else {
        return Ok(Json(WorkflowVerifyResponse {
            fork_exists: false,
            actions_enabled: false,
            repo_url: None,
            actions_url: None,
            message: "Fork not found. Set up the repository first.".to_string(),
        }));
    };

    let actions_enabled = github
        .get_actions_permissions(&auth.login, &repo.name)
        .await?
        .map(|p| p.enabled)
        .unwrap_or(false);

    let message = if actions_enabled {
        "Fork is ready to deploy".to_string()
    } else {
        fork::actions_disabled_message(&auth.login, &repo.name)
    };

    Ok(Json(WorkflowVerifyResponse {
        fork_exists: true,
        actions_enabled,
        actions_url: Some(fork::actions_url(&auth.login, &repo.name)),
        repo_url: Some(repo.html_url),
        message,
    }))
}

/// Create a deployment and run it up to the workflow dispatch
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    auth: AuthSession,
    Json(request): Json<DeployRequest>,
) -> Result<(StatusCode, Json<DeployResponse>), LauncherError> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(LauncherError::ValidationError(
            "sessionId is required".to_string(),
        ));
    }

    let branch_name = request
        .branch_name
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());
    if let Some(branch) = &branch_name {
        validate_branch_name(branch).map_err(LauncherError::ValidationError)?;
    }

    let deployment = state
        .store
        .create_deployment(NewDeployment {
            session_id: session_id.to_string(),
            branch_name,
            github_login: auth.login.clone(),
            repo_name: state.deploy_options.repo.clone(),
        })
        .await?;
    let deployment_id = deployment.id.clone();

    // Runs on its own task so a dropped request does not abort the sequence.
    let github = auth.github(&state.github);
    let task_state = Arc::clone(&state);
    let result = tokio::spawn(async move {
        Orchestrator::new(&github, task_state.store.as_ref(), &task_state.deploy_options)
            .run(&deployment)
            .await
    })
    .await
    .map_err(|e| LauncherError::Internal(format!("Deployment task failed: {}", e)))?;

    match result {
        Ok(outcome) => Ok((
            StatusCode::OK,
            Json(DeployResponse {
                success: true,
                deployment_id,
                branch_name: Some(outcome.branch_name),
                workflow_url: Some(outcome.workflow_url),
                message: "Workflow dispatched".to_string(),
            }),
        )),
        Err(e) => {
            error!("Deployment {} failed: {}", deployment_id, e);
            Ok((
                e.status_code(),
                Json(DeployResponse {
                    success: false,
                    deployment_id,
                    branch_name: None,
                    workflow_url: None,
                    message: e.user_message(),
                }),
            ))
        }
    }
}

/// Deployments of the session's user, newest first
pub async fn deployments_handler(
    State(state): State<Arc<ServerState>>,
    auth: AuthSession,
) -> Result<Json<DeploymentListResponse>, LauncherError> {
    let deployments: Vec<DeploymentView> = state
        .store
        .list_deployments(&auth.login)
        .await?
        .iter()
        .map(Deployment::to_view)
        .collect();

    Ok(Json(DeploymentListResponse {
        total: deployments.len(),
        deployments,
    }))
}

/// One deployment owned by the session's user
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    auth: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<DeploymentView>, LauncherError> {
    let deployment = owned_deployment(&state, &auth, &id).await?;
    Ok(Json(deployment.to_view()))
}

/// Stored logs of a deployment, oldest first
pub async fn deployment_logs_handler(
    State(state): State<Arc<ServerState>>,
    auth: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<DeploymentLogsResponse>, LauncherError> {
    let deployment = owned_deployment(&state, &auth, &id).await?;
    let logs = state
        .store
        .list_logs(&deployment.id)
        .await?
        .iter()
        .map(|log| log.to_entry())
        .collect();

    Ok(Json(DeploymentLogsResponse {
        deployment_id: deployment.id,
        logs,
    }))
}

/// Load a deployment, hiding deployments of other users as not found
pub(crate) async fn owned_deployment(
    state: &ServerState,
    auth: &AuthSession,
    id: &str,
) -> Result<Deployment, LauncherError> {
    state
        .store
        .get_deployment(id)
        .await?
        .filter(|d| d.github_login == auth.login)
        .ok_or_else(|| LauncherError::NotFound(format!("Deployment {} not found", id)))
}

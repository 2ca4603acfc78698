//! API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated user (`GET /user`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Repository owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Parent of a forked repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRepository {
    pub full_name: String,
}

/// Repository (`GET /repos/{owner}/{repo}`, `POST .../forks`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub parent: Option<ParentRepository>,
}

/// Git object pointed to by a reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitObject {
    pub sha: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Git reference (`GET /repos/{owner}/{repo}/git/ref/{ref}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub reference: String,
    pub object: GitObject,
}

/// Create reference request (`POST /repos/{owner}/{repo}/git/refs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sha: String,
}

/// File contents (`GET /repos/{owner}/{repo}/contents/{path}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFile {
    pub sha: String,
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Create or update file request (`PUT /repos/{owner}/{repo}/contents/{path}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContentRequest {
    pub message: String,
    /// Base64 encoded file contents
    pub content: String,
    pub branch: String,
    /// Blob SHA of the file being replaced; required for updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Create or update file response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContentResponse {
    pub content: Option<ContentFile>,
}

/// Repository Actions permissions (`/repos/{owner}/{repo}/actions/permissions`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsPermissions {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<String>,
}

/// Workflow dispatch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Run or job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Run, job or step conclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    #[serde(other)]
    Unknown,
}

/// Workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

/// Workflow runs page (`GET /repos/{owner}/{repo}/actions/runs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunList {
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Step of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub number: u32,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job of a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Jobs page (`GET /repos/{owner}/{repo}/actions/runs/{run_id}/jobs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    pub total_count: u64,
    pub jobs: Vec<Job>,
}

/// OAuth code exchange request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// OAuth code exchange response
///
/// GitHub answers 200 even when the exchange fails, with `error` set instead of
/// `access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Error body returned by the REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
}

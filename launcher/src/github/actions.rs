//! GitHub Actions permissions, dispatches, runs and jobs

use github_models::{ActionsPermissions, DispatchRequest, Job, JobList, WorkflowRun, WorkflowRunList};

use crate::errors::LauncherError;
use crate::github::client::GitHubClient;
use crate::github::contents::encode_query;

impl GitHubClient {
    /// Get the Actions permissions of a repository
    pub async fn get_actions_permissions(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<ActionsPermissions>, LauncherError> {
        let path = format!("/repos/{}/{}/actions/permissions", owner, repo);
        self.get(&path).await
    }

    /// Enable Actions for all actions on a repository
    pub async fn enable_actions(&self, owner: &str, repo: &str) -> Result<(), LauncherError> {
        let path = format!("/repos/{}/{}/actions/permissions", owner, repo);
        let body = ActionsPermissions {
            enabled: true,
            allowed_actions: Some("all".to_string()),
        };
        self.put_no_content(&path, &body).await?.ok_or_else(|| {
            LauncherError::NotFound(format!("Repository {}/{} not found", owner, repo))
        })
    }

    /// Trigger a `workflow_dispatch` run on `branch`
    ///
    /// Returns `None` when GitHub does not know the workflow yet, or when
    /// workflows are disabled on the repository.
    pub async fn dispatch_workflow(
        &self,
        owner: &str,
        repo: &str,
        workflow_file: &str,
        branch: &str,
    ) -> Result<Option<()>, LauncherError> {
        let path = format!(
            "/repos/{}/{}/actions/workflows/{}/dispatches",
            owner, repo, workflow_file
        );
        let body = DispatchRequest {
            reference: branch.to_string(),
        };
        self.post_no_content(&path, &body).await
    }

    /// Most recent workflow runs, newest first
    pub async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        per_page: u32,
    ) -> Result<Vec<WorkflowRun>, LauncherError> {
        let mut path = format!("/repos/{}/{}/actions/runs?per_page={}", owner, repo, per_page);
        if let Some(branch) = branch {
            path.push_str(&format!("&branch={}", encode_query(branch)));
        }
        let runs: Option<WorkflowRunList> = self.get(&path).await?;
        Ok(runs.map(|r| r.workflow_runs).unwrap_or_default())
    }

    /// Jobs and their steps for a workflow run
    pub async fn list_run_jobs(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<Vec<Job>, LauncherError> {
        let path = format!("/repos/{}/{}/actions/runs/{}/jobs", owner, repo, run_id);
        let jobs: Option<JobList> = self.get(&path).await?;
        Ok(jobs.map(|j| j.jobs).unwrap_or_default())
    }
}

//! Users, repositories, forks and branches

use github_models::{CreateRefRequest, GitRef, Repository, User};

use crate::errors::LauncherError;
use crate::github::client::GitHubClient;

impl GitHubClient {
    /// Get the user owning the token
    pub async fn get_authenticated_user(&self) -> Result<User, LauncherError> {
        self.get("/user")
            .await?
            .ok_or_else(|| LauncherError::AuthError("GitHub token is not valid".to_string()))
    }

    /// Get a repository, `None` when it does not exist or is not visible
    pub async fn get_repository(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<Repository>, LauncherError> {
        let path = format!("/repos/{}/{}", owner, repo);
        self.get(&path).await
    }

    /// Fork a repository into the authenticated user's account
    ///
    /// GitHub creates forks asynchronously; the returned repository may not be
    /// readable for a few seconds.
    pub async fn create_fork(&self, owner: &str, repo: &str) -> Result<Repository, LauncherError> {
        let path = format!("/repos/{}/{}/forks", owner, repo);
        self.post(&path, &serde_json::json!({}))
            .await?
            .ok_or_else(|| {
                LauncherError::NotFound(format!("Upstream repository {}/{} not found", owner, repo))
            })
    }

    /// Get the reference of a branch, `None` when the branch does not exist
    pub async fn get_branch_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<GitRef>, LauncherError> {
        let path = format!("/repos/{}/{}/git/ref/heads/{}", owner, repo, branch);
        self.get(&path).await
    }

    /// Create a branch pointing at `sha`
    pub async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<GitRef, LauncherError> {
        let path = format!("/repos/{}/{}/git/refs", owner, repo);
        let body = CreateRefRequest {
            reference: format!("refs/heads/{}", branch),
            sha: sha.to_string(),
        };
        self.post(&path, &body).await?.ok_or_else(|| {
            LauncherError::NotFound(format!("Repository {}/{} not found", owner, repo))
        })
    }
}

//! Fork lookup, creation and Actions checks

use github_models::Repository;
use tracing::{debug, info, warn};

use crate::deploy::orchestrator::DeployOptions;
use crate::errors::LauncherError;
use crate::github::GitHubClient;

/// A user's fork of the upstream repository
#[derive(Debug, Clone)]
pub struct Fork {
    pub repo: Repository,
    /// False when the fork already existed
    pub created: bool,
}

impl Fork {
    pub fn name(&self) -> &str {
        &self.repo.name
    }
}

/// Find the user's fork of the upstream repository, creating it when missing
pub async fn ensure_fork(
    github: &GitHubClient,
    options: &DeployOptions,
    login: &str,
) -> Result<Fork, LauncherError> {
    if let Some(repo) = github.get_repository(login, &options.repo).await? {
        check_fork_of_upstream(&repo, options)?;
        debug!("Using existing fork {}", repo.full_name);
        return Ok(Fork {
            repo,
            created: false,
        });
    }

    info!("Forking {}/{} for {}", options.owner, options.repo, login);
    let fork = github.create_fork(&options.owner, &options.repo).await?;

    let fork_owner = fork.owner.login.clone();
    for attempt in 1..=options.fork_poll_attempts {
        if let Some(repo) = github.get_repository(&fork_owner, &fork.name).await? {
            info!("Fork {} ready after {} check(s)", repo.full_name, attempt);
            return Ok(Fork {
                repo,
                created: true,
            });
        }
        debug!("Fork {} not ready yet (check {})", fork.full_name, attempt);
        tokio::time::sleep(options.fork_poll_interval).await;
    }

    Err(LauncherError::NotFound(format!(
        "Fork {} is not available yet; GitHub may still be creating it. Try again in a minute.",
        fork.full_name
    )))
}

/// Refuse to deploy into a same-named repository that is not the upstream's fork
fn check_fork_of_upstream(repo: &Repository, options: &DeployOptions) -> Result<(), LauncherError> {
    let upstream = format!("{}/{}", options.owner, options.repo);
    let parent = repo.parent.as_ref().map(|p| p.full_name.as_str());

    let is_upstream_fork = repo.fork
        && parent.is_none_or(|parent| parent.eq_ignore_ascii_case(&upstream));
    if is_upstream_fork {
        return Ok(());
    }

    warn!(
        "{} exists but is not a fork of {} (parent: {:?})",
        repo.full_name, upstream, parent
    );
    Err(LauncherError::Conflict(format!(
        "{} already exists and is not a fork of {}. Rename or delete it, then try again.",
        repo.full_name, upstream
    )))
}

/// Actions state of a fork after [`ensure_actions_enabled`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionsState {
    AlreadyEnabled,
    Enabled,
}

/// Make sure Actions may run on the fork
pub async fn ensure_actions_enabled(
    github: &GitHubClient,
    login: &str,
    repo: &str,
) -> Result<ActionsState, LauncherError> {
    let permissions = github
        .get_actions_permissions(login, repo)
        .await?
        .ok_or_else(|| {
            LauncherError::PermissionError(format!(
                "Cannot read Actions settings of {}/{}",
                login, repo
            ))
        })?;

    if permissions.enabled {
        return Ok(ActionsState::AlreadyEnabled);
    }

    info!("Enabling GitHub Actions on {}/{}", login, repo);
    github.enable_actions(login, repo).await?;
    Ok(ActionsState::Enabled)
}

/// Remediation shown when workflows cannot be dispatched on a fork
pub fn actions_disabled_message(login: &str, repo: &str) -> String {
    format!(
        "GitHub Actions workflows are disabled on your fork. Open {} and click \
         \"I understand my workflows, go ahead and enable them\", then deploy again.",
        actions_url(login, repo)
    )
}

/// Actions page of a repository
pub fn actions_url(login: &str, repo: &str) -> String {
    format!("https://github.com/{}/{}/actions", login, repo)
}

//! Deployment orchestrator
//!
//! Drives one deployment from the browser request to a dispatched workflow run
//! on the user's fork. Every step appends a `running` log and then exactly one
//! terminal log (`success`, `failed` or `warning`). The first failing step marks
//! the deployment `failed` and aborts; nothing is rolled back.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::settings::TargetSettings;
use crate::deploy::fork::{self, ActionsState};
use crate::deploy::fsm::{StepEvent, StepFsm};
use crate::deploy::patch;
use crate::deploy::template;
use crate::errors::LauncherError;
use crate::github::GitHubClient;
use crate::models::deployment::{
    Deployment, DeploymentStatus, DeploymentStatusUpdate, LogStatus, NewDeploymentLog,
};
use crate::storage::DeploymentStore;
use crate::utils;

/// Options for deployments onto forks of one upstream repository
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Upstream owner
    pub owner: String,
    /// Upstream repository name
    pub repo: String,
    /// Branch new deployment branches start from when the fork reports none
    pub default_branch: String,
    pub workflow_file: String,
    pub config_path: String,
    pub env_path: String,
    pub fork_poll_attempts: u32,
    pub fork_poll_interval: Duration,
    /// Wait between pushing the workflow file and dispatching it
    pub index_delay: Duration,
    pub dispatch_retry_delay: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            default_branch: "main".to_string(),
            workflow_file: "deploy.yml".to_string(),
            config_path: "config.js".to_string(),
            env_path: ".env".to_string(),
            fork_poll_attempts: 10,
            fork_poll_interval: Duration::from_secs(2),
            index_delay: Duration::from_secs(3),
            dispatch_retry_delay: Duration::from_secs(5),
        }
    }
}

impl DeployOptions {
    pub fn from_target(target: &TargetSettings) -> Self {
        Self {
            owner: target.owner.clone(),
            repo: target.repo.clone(),
            default_branch: target.default_branch.clone(),
            workflow_file: target.workflow_file_name.clone(),
            config_path: target.config_file_path.clone(),
            env_path: target.env_file_path.clone(),
            ..Default::default()
        }
    }
}

/// Result of a dispatched deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub branch_name: String,
    pub repo_name: String,
    pub workflow_url: String,
}

/// Runs the deployment sequence for one deployment
pub struct Orchestrator<'a> {
    github: &'a GitHubClient,
    store: &'a dyn DeploymentStore,
    options: &'a DeployOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        github: &'a GitHubClient,
        store: &'a dyn DeploymentStore,
        options: &'a DeployOptions,
    ) -> Self {
        Self {
            github,
            store,
            options,
        }
    }

    /// Run the deployment and record its final status
    ///
    /// `deployment.branch_name` is the requested branch; a name is generated when
    /// it is unset.
    pub async fn run(&self, deployment: &Deployment) -> Result<DeployOutcome, LauncherError> {
        info!("Starting deployment {}", deployment.id);

        self.store
            .update_deployment_status(
                &deployment.id,
                DeploymentStatusUpdate::new(DeploymentStatus::Running, "Deployment started"),
            )
            .await?;

        match self.execute(deployment).await {
            Ok(outcome) => {
                self.store
                    .update_deployment_status(
                        &deployment.id,
                        DeploymentStatusUpdate::new(
                            DeploymentStatus::Running,
                            "Workflow dispatched",
                        )
                        .with_branch(outcome.branch_name.clone())
                        .with_repo(outcome.repo_name.clone())
                        .with_workflow_url(outcome.workflow_url.clone()),
                    )
                    .await?;
                info!(
                    "Deployment {} dispatched on {}/{}",
                    deployment.id, outcome.repo_name, outcome.branch_name
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Deployment {} failed: {}", deployment.id, e);
                let message = failure_message(&e);
                if let Err(store_err) = self
                    .store
                    .update_deployment_status(
                        &deployment.id,
                        DeploymentStatusUpdate::new(DeploymentStatus::Failed, message),
                    )
                    .await
                {
                    error!(
                        "Failed to record failure of deployment {}: {}",
                        deployment.id, store_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, deployment: &Deployment) -> Result<DeployOutcome, LauncherError> {
        let id = deployment.id.as_str();
        let options = self.options;

        // authenticate
        let mut step = self.begin(id, "authenticate", "Verifying GitHub access").await?;
        let user = match self.github.get_authenticated_user().await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(id, &mut step, e).await),
        };
        let login = user.login;
        self.finish(id, &mut step, StepEvent::Succeed(format!("Authenticated as {}", login)))
            .await?;

        // fork
        let mut step = self
            .begin(id, "fork", &format!("Forking {}/{}", options.owner, options.repo))
            .await?;
        let forked = match fork::ensure_fork(self.github, options, &login).await {
            Ok(forked) => forked,
            Err(e) => return Err(self.fail(id, &mut step, e).await),
        };
        let repo_name = forked.name().to_string();
        let message = if forked.created {
            format!("Created fork {}", forked.repo.full_name)
        } else {
            format!("Using existing fork {}", forked.repo.full_name)
        };
        self.finish(id, &mut step, StepEvent::Succeed(message)).await?;
        self.store
            .update_deployment_status(
                id,
                DeploymentStatusUpdate::new(DeploymentStatus::Running, "Fork ready")
                    .with_repo(repo_name.clone()),
            )
            .await?;

        // actions
        let mut step = self.begin(id, "actions", "Checking GitHub Actions").await?;
        let event = match fork::ensure_actions_enabled(self.github, &login, &repo_name).await {
            Ok(ActionsState::AlreadyEnabled) => {
                StepEvent::Succeed("GitHub Actions already enabled".to_string())
            }
            Ok(ActionsState::Enabled) => StepEvent::Succeed("GitHub Actions enabled".to_string()),
            Err(e) => {
                warn!("Could not enable Actions on {}/{}: {}", login, repo_name, e);
                StepEvent::Warn(format!(
                    "Could not verify GitHub Actions ({}); continuing",
                    e
                ))
            }
        };
        self.finish(id, &mut step, event).await?;

        // branch
        let mut step = self.begin(id, "branch", "Creating deployment branch").await?;
        let branch = match self
            .create_branch(&login, &repo_name, forked.repo.default_branch.as_deref(), deployment)
            .await
        {
            Ok(branch) => branch,
            Err(e) => return Err(self.fail(id, &mut step, e).await),
        };
        self.finish(id, &mut step, StepEvent::Succeed(format!("Created branch {}", branch)))
            .await?;
        self.store
            .update_deployment_status(
                id,
                DeploymentStatusUpdate::new(DeploymentStatus::Running, "Branch created")
                    .with_branch(branch.clone()),
            )
            .await?;

        // config
        let mut step = self
            .begin(id, "config", &format!("Writing {}", options.config_path))
            .await?;
        let session_id = deployment.session_id.as_str();
        if let Err(e) = self
            .upsert_file(&login, &repo_name, &branch, &options.config_path, |existing| {
                patch::patch_config(existing, session_id)
            })
            .await
        {
            return Err(self.fail(id, &mut step, e).await);
        }
        self.finish(
            id,
            &mut step,
            StepEvent::Succeed(format!("Session ID written to {}", options.config_path)),
        )
        .await?;

        // env
        let mut step = self
            .begin(id, "env", &format!("Writing {}", options.env_path))
            .await?;
        if let Err(e) = self
            .upsert_file(&login, &repo_name, &branch, &options.env_path, |existing| {
                patch::patch_env(existing, session_id)
            })
            .await
        {
            return Err(self.fail(id, &mut step, e).await);
        }
        self.finish(
            id,
            &mut step,
            StepEvent::Succeed(format!("Session ID written to {}", options.env_path)),
        )
        .await?;

        // workflow
        let workflow_path = template::workflow_path(&options.workflow_file);
        let mut step = self
            .begin(id, "workflow", &format!("Writing {}", workflow_path))
            .await?;
        let workflow = template::render_workflow(&branch, &options.workflow_file);
        if let Err(e) = self
            .upsert_file(&login, &repo_name, &branch, &workflow_path, |_| workflow)
            .await
        {
            return Err(self.fail(id, &mut step, e).await);
        }
        self.finish(id, &mut step, StepEvent::Succeed(format!("Workflow written to {}", workflow_path)))
            .await?;

        // dispatch
        let mut step = self.begin(id, "dispatch", "Starting workflow").await?;
        debug!("Waiting {:?} for GitHub to index the workflow", options.index_delay);
        tokio::time::sleep(options.index_delay).await;
        if let Err(e) = self.dispatch(&login, &repo_name, &branch).await {
            return Err(self.fail(id, &mut step, e).await);
        }
        self.finish(id, &mut step, StepEvent::Succeed("Workflow dispatched".to_string()))
            .await?;

        Ok(DeployOutcome {
            branch_name: branch,
            workflow_url: fork::actions_url(&login, &repo_name),
            repo_name,
        })
    }

    async fn create_branch(
        &self,
        login: &str,
        repo: &str,
        fork_default_branch: Option<&str>,
        deployment: &Deployment,
    ) -> Result<String, LauncherError> {
        let branch = match deployment.branch_name.as_deref() {
            Some(requested) => {
                utils::validate_branch_name(requested).map_err(LauncherError::ValidationError)?;
                requested.to_string()
            }
            None => utils::generate_branch_name(),
        };

        if self.github.get_branch_ref(login, repo, &branch).await?.is_some() {
            return Err(LauncherError::Conflict(format!(
                "Branch {} already exists on {}/{}",
                branch, login, repo
            )));
        }

        let base = fork_default_branch.unwrap_or(&self.options.default_branch);
        let tip = self
            .github
            .get_branch_ref(login, repo, base)
            .await?
            .ok_or_else(|| {
                LauncherError::NotFound(format!(
                    "Base branch {} not found on {}/{}",
                    base, login, repo
                ))
            })?;

        self.github
            .create_branch(login, repo, &branch, &tip.object.sha)
            .await?;
        debug!("Created {} from {}@{}", branch, base, tip.object.sha);
        Ok(branch)
    }

    async fn upsert_file<F>(
        &self,
        login: &str,
        repo: &str,
        branch: &str,
        path: &str,
        render: F,
    ) -> Result<(), LauncherError>
    where
        F: FnOnce(Option<&str>) -> String,
    {
        let existing = self.github.get_file(login, repo, path, branch).await?;
        let text = render(existing.as_ref().map(|f| f.text.as_str()));
        let message = match existing {
            Some(_) => format!("Update {}", path),
            None => format!("Add {}", path),
        };

        self.github
            .put_file(
                login,
                repo,
                path,
                branch,
                &message,
                &text,
                existing.as_ref().map(|f| f.sha.as_str()),
            )
            .await
    }

    async fn dispatch(&self, login: &str, repo: &str, branch: &str) -> Result<(), LauncherError> {
        let workflow_file = &self.options.workflow_file;

        if self
            .github
            .dispatch_workflow(login, repo, workflow_file, branch)
            .await?
            .is_some()
        {
            return Ok(());
        }

        warn!(
            "Workflow {} not found on {}/{}, retrying in {:?}",
            workflow_file, login, repo, self.options.dispatch_retry_delay
        );
        tokio::time::sleep(self.options.dispatch_retry_delay).await;

        self.github
            .dispatch_workflow(login, repo, workflow_file, branch)
            .await?
            .ok_or_else(|| {
                LauncherError::PermissionError(fork::actions_disabled_message(login, repo))
            })
    }

    async fn begin(
        &self,
        deployment_id: &str,
        step: &str,
        message: &str,
    ) -> Result<StepFsm, LauncherError> {
        let mut fsm = StepFsm::new(step);
        let status = fsm.process(StepEvent::Start).map_err(LauncherError::Internal)?;
        self.record(deployment_id, &fsm, status, message).await?;
        Ok(fsm)
    }

    async fn finish(
        &self,
        deployment_id: &str,
        fsm: &mut StepFsm,
        event: StepEvent,
    ) -> Result<(), LauncherError> {
        let status = fsm.process(event).map_err(LauncherError::Internal)?;
        let message = fsm.message().unwrap_or_default().to_string();
        self.record(deployment_id, fsm, status, &message).await
    }

    /// Record a failed step and hand the error back
    async fn fail(&self, deployment_id: &str, fsm: &mut StepFsm, e: LauncherError) -> LauncherError {
        if let Err(log_err) = self
            .finish(deployment_id, fsm, StepEvent::Fail(failure_message(&e)))
            .await
        {
            error!("Failed to log failed step {}: {}", fsm.step(), log_err);
        }
        e
    }

    async fn record(
        &self,
        deployment_id: &str,
        fsm: &StepFsm,
        status: LogStatus,
        message: &str,
    ) -> Result<(), LauncherError> {
        self.store
            .append_log(NewDeploymentLog {
                deployment_id: deployment_id.to_string(),
                step: fsm.step().to_string(),
                status,
                message: message.to_string(),
            })
            .await?;
        Ok(())
    }
}

/// Human readable failure text stored on the deployment
fn failure_message(e: &LauncherError) -> String {
    let message = e.user_message();
    if message.trim().is_empty() {
        "Deployment failed".to_string()
    } else {
        message
    }
}

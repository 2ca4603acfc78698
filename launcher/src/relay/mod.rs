//! Deployment log relay
//!
//! Socket clients subscribe to a deployment id. The first subscriber starts a
//! poll task for that deployment which, every `interval`, merges the stored
//! orchestration logs with the steps of the latest workflow run and pushes them
//! to every subscriber. The task stops once the deployment leaves
//! `pending`/`running` or nobody listens anymore; a later subscription starts it
//! again.

pub mod steps;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_models::{LogEntry, ServerMessage};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::errors::LauncherError;
use crate::github::GitHubClient;
use crate::models::deployment::{Deployment, DeploymentStatus, DeploymentStatusUpdate};
use crate::storage::DeploymentStore;

/// Relay options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between polls of a subscribed deployment
    pub interval: Duration,

    /// Workflow runs fetched per poll
    pub runs_per_page: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            runs_per_page: 5,
        }
    }
}

pub type SubscriberId = u64;

/// Channel delivering relay messages to one socket
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Steps of the latest run and, once it finished, the status it implies
struct RunLogs {
    entries: Vec<LogEntry>,
    completed: Option<(DeploymentStatus, String)>,
}

struct Topic {
    subscribers: HashMap<SubscriberId, Outbox>,
    /// Client of the subscriber that opened the topic; reads the fork's runs
    github: Arc<GitHubClient>,
    polling: bool,
    /// Someone joined a running task after its last broadcast
    awaiting_snapshot: bool,
}

/// Fan-out of deployment logs to socket subscribers
pub struct RelayHub {
    options: Options,
    store: Arc<dyn DeploymentStore>,
    topics: Mutex<HashMap<String, Topic>>,
    next_id: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl RelayHub {
    pub fn new(options: Options, store: Arc<dyn DeploymentStore>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            options,
            store,
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shutdown,
        }
    }

    /// Allocate an id for a new socket
    pub fn next_subscriber_id(&self) -> SubscriberId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe a socket to a deployment, starting its poll task when idle
    pub fn subscribe(
        self: &Arc<Self>,
        deployment_id: &str,
        subscriber: SubscriberId,
        outbox: Outbox,
        github: GitHubClient,
    ) {
        let start = {
            let mut topics = self.lock_topics();
            let topic = topics
                .entry(deployment_id.to_string())
                .or_insert_with(|| Topic {
                    subscribers: HashMap::new(),
                    github: Arc::new(github),
                    polling: false,
                    awaiting_snapshot: false,
                });
            topic.subscribers.insert(subscriber, outbox);
            let start = !topic.polling && !*self.shutdown.borrow();
            if start {
                topic.polling = true;
            } else if topic.polling {
                topic.awaiting_snapshot = true;
            }
            start
        };

        debug!("Subscriber {} joined deployment {}", subscriber, deployment_id);

        if start {
            let hub = Arc::clone(self);
            let deployment_id = deployment_id.to_string();
            tokio::spawn(async move {
                hub.poll_deployment(deployment_id).await;
            });
        }
    }

    /// Remove a socket from one deployment
    pub fn unsubscribe(&self, deployment_id: &str, subscriber: SubscriberId) {
        let mut topics = self.lock_topics();
        if let Some(topic) = topics.get_mut(deployment_id) {
            topic.subscribers.remove(&subscriber);
            if topic.subscribers.is_empty() && !topic.polling {
                topics.remove(deployment_id);
            }
        }
        debug!("Subscriber {} left deployment {}", subscriber, deployment_id);
    }

    /// Remove a socket from every deployment it watches
    pub fn unsubscribe_all(&self, subscriber: SubscriberId) {
        let mut topics = self.lock_topics();
        for topic in topics.values_mut() {
            topic.subscribers.remove(&subscriber);
        }
        topics.retain(|_, topic| !topic.subscribers.is_empty() || topic.polling);
    }

    /// Number of sockets subscribed to a deployment
    pub fn subscriber_count(&self, deployment_id: &str) -> usize {
        self.lock_topics()
            .get(deployment_id)
            .map(|t| t.subscribers.len())
            .unwrap_or(0)
    }

    /// Whether a poll task is live for a deployment
    pub fn is_polling(&self, deployment_id: &str) -> bool {
        self.lock_topics()
            .get(deployment_id)
            .map(|t| t.polling)
            .unwrap_or(false)
    }

    /// Stop all poll tasks
    pub fn shutdown(&self) {
        info!("Relay shutting down...");
        self.shutdown.send_replace(true);
    }

    fn lock_topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn poll_deployment(self: Arc<Self>, deployment_id: String) {
        debug!("Relay poll task started for deployment {}", deployment_id);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let Some(github) = self.live_client(&deployment_id) else {
                break;
            };

            let active = match self.poll_once(&deployment_id, &github).await {
                Ok(active) => active,
                Err(e) => {
                    error!("Relay poll of deployment {} failed: {}", deployment_id, e);
                    self.broadcast(
                        &deployment_id,
                        ServerMessage::Error {
                            message: e.user_message(),
                        },
                    );
                    !matches!(e, LauncherError::NotFound(_))
                }
            };

            if !active {
                if self.stop_polling(&deployment_id) {
                    // late subscriber still needs its snapshot
                    continue;
                }
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    self.stop_polling(&deployment_id);
                    break;
                }
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }

        debug!("Relay poll task stopped for deployment {}", deployment_id);
    }

    /// Client for the next poll, or `None` when the topic has no subscribers left
    fn live_client(&self, deployment_id: &str) -> Option<Arc<GitHubClient>> {
        let mut topics = self.lock_topics();
        let topic = topics.get_mut(deployment_id)?;
        topic.subscribers.retain(|_, outbox| !outbox.is_closed());
        if topic.subscribers.is_empty() {
            topics.remove(deployment_id);
            return None;
        }
        Some(Arc::clone(&topic.github))
    }

    /// Release the topic's poll task. Returns `true` instead when a subscriber
    /// joined after the last broadcast; the task then owes it one more poll.
    fn stop_polling(&self, deployment_id: &str) -> bool {
        let mut topics = self.lock_topics();
        let Some(topic) = topics.get_mut(deployment_id) else {
            return false;
        };
        if topic.awaiting_snapshot && !topic.subscribers.is_empty() && !*self.shutdown.borrow()
        {
            topic.awaiting_snapshot = false;
            return true;
        }
        topic.polling = false;
        topic.awaiting_snapshot = false;
        if topic.subscribers.is_empty() {
            topics.remove(deployment_id);
        }
        false
    }

    /// One poll; returns whether the deployment is still active
    async fn poll_once(
        &self,
        deployment_id: &str,
        github: &GitHubClient,
    ) -> Result<bool, LauncherError> {
        let mut deployment = self
            .store
            .get_deployment(deployment_id)
            .await?
            .ok_or_else(|| {
                LauncherError::NotFound(format!("Deployment {} not found", deployment_id))
            })?;

        let mut logs: Vec<LogEntry> = self
            .store
            .list_logs(deployment_id)
            .await?
            .iter()
            .map(|log| log.to_entry())
            .collect();

        match self.run_logs(&deployment, github).await {
            Ok(Some(run)) => {
                logs.extend(run.entries);
                if let Some((status, message)) = run.completed {
                    if deployment.status.is_active() {
                        info!(
                            "Deployment {} workflow finished: {}",
                            deployment_id,
                            status.as_str()
                        );
                        deployment = self
                            .store
                            .update_deployment_status(
                                deployment_id,
                                DeploymentStatusUpdate::new(status, message),
                            )
                            .await?;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Could not read workflow runs of deployment {}: {}",
                deployment_id, e
            ),
        }

        logs.sort_by_key(|entry| entry.timestamp);

        self.broadcast(
            deployment_id,
            ServerMessage::Logs {
                deployment_id: deployment_id.to_string(),
                logs,
                timestamp: Utc::now(),
            },
        );

        Ok(deployment.status.is_active())
    }

    async fn run_logs(
        &self,
        deployment: &Deployment,
        github: &GitHubClient,
    ) -> Result<Option<RunLogs>, LauncherError> {
        let Some(branch) = deployment.branch_name.as_deref() else {
            return Ok(None);
        };
        if deployment.workflow_url.is_none() {
            // not dispatched yet
            return Ok(None);
        }

        let runs = github
            .list_workflow_runs(
                &deployment.github_login,
                &deployment.repo_name,
                Some(branch),
                self.options.runs_per_page,
            )
            .await?;
        let Some(latest) = runs.into_iter().max_by_key(|run| run.created_at) else {
            return Ok(None);
        };

        let jobs = github
            .list_run_jobs(&deployment.github_login, &deployment.repo_name, latest.id)
            .await?;

        Ok(Some(RunLogs {
            entries: steps::run_step_entries(&jobs, Utc::now()),
            completed: steps::completed_run_status(&latest),
        }))
    }

    fn broadcast(&self, deployment_id: &str, message: ServerMessage) {
        let mut topics = self.lock_topics();
        let Some(topic) = topics.get_mut(deployment_id) else {
            return;
        };
        topic.awaiting_snapshot = false;
        topic
            .subscribers
            .retain(|_, outbox| outbox.send(message.clone()).is_ok());
    }
}

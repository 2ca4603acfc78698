//! Expired session sweeper

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::session::SessionStore;

/// Session sweeper options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between sweeps
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600), // 10 minutes
        }
    }
}

/// Run the session sweeper
pub async fn run<S, F>(
    options: &Options,
    sessions: &SessionStore,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Session sweeper starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Session sweeper shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let removed = sessions.sweep_expired(Utc::now()).await;
        if removed > 0 {
            info!("Removed {} expired session(s)", removed);
        } else {
            debug!("No expired sessions");
        }
    }
}

//! Periodic status refresh for every registered library.

use super::tracker::LibraryTracker;
use crate::config::PollConfig;
use crate::error::ControlError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Queries the status of all libraries at a fixed interval.
///
/// Overlapping checks for one library are suppressed by
/// [`LibraryTracker::query_status`], so a slow status command only delays
/// that library's next refresh.
pub struct StatusPoller {
    tracker: Arc<LibraryTracker>,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(tracker: Arc<LibraryTracker>) -> Self {
        Self {
            tracker,
            interval: PollConfig::STATUS_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Dispatch one status check per library. Returns how many were started.
    pub async fn poll_once(tracker: &LibraryTracker) -> usize {
        let mut dispatched = 0;
        for name in tracker.names() {
            match tracker.query_status(&name).await {
                Ok(Some(_detached)) => dispatched += 1,
                Ok(None) => {}
                Err(ControlError::MissingCommand { .. }) => {
                    debug!("Library {} has no status command", name);
                }
                Err(e) => warn!("Status check for {} not dispatched: {}", name, e),
            }
        }
        dispatched
    }

    /// Start polling on the current runtime.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let tracker = self.tracker;
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            info!("Polling library status every {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let dispatched = Self::poll_once(&tracker).await;
                        debug!("Dispatched {} status checks", dispatched);
                    }
                }
            }
            debug!("Status poller stopped");
        });

        PollerHandle {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

/// Running poller. Dropping it aborts the polling task.
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling and wait for the task to finish. Status checks already
    /// dispatched keep running.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

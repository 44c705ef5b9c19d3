//! Per-library state guarded for concurrent workers.

use super::types::{
    LibraryAction, LibraryEvent, LibraryFailure, LibrarySnapshot, LibraryStatus, Locality,
};
use crate::catalog::LibraryDefinition;
use crate::error::ControlError;
use crate::exec::{ExecutionTarget, RemoteHost};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Mutable part of a library.
#[derive(Debug, Default)]
pub(crate) struct LibraryState {
    pub ip: Option<Ipv4Addr>,
    pub hostname: Option<String>,
    pub locality: Locality,
    pub status: LibraryStatus,
    pub last_error: Option<LibraryFailure>,
    /// Bumped by every start and stop. Workers only write status for the
    /// attempt they were spawned for.
    pub attempt: u64,
}

impl LibraryState {
    /// Start a new start or stop attempt and return its number.
    pub fn begin_attempt(&mut self) -> u64 {
        self.attempt = self.attempt.wrapping_add(1);
        self.attempt
    }

    /// Target for start and stop commands.
    pub fn execution_target(&self) -> ExecutionTarget {
        match (&self.locality, self.ip) {
            (Locality::Remote { login, password }, Some(ip)) => {
                ExecutionTarget::Remote(RemoteHost::new(ip, login.clone(), password.clone()))
            }
            _ => ExecutionTarget::Local,
        }
    }
}

/// A registered library. Commands and node names are fixed at registration;
/// everything else lives behind the state mutex.
#[derive(Debug)]
pub(crate) struct LibraryEntry {
    pub name: String,
    pub nodes: Vec<String>,
    pub start_cmd: String,
    pub stop_cmd: String,
    pub status_cmd: String,
    pub base_path: Option<PathBuf>,
    state: Mutex<LibraryState>,
    status_check_running: AtomicBool,
}

impl LibraryEntry {
    pub fn new(definition: LibraryDefinition, ip: Option<Ipv4Addr>, hostname: Option<String>) -> Self {
        Self {
            name: definition.name,
            nodes: definition.nodes,
            start_cmd: definition.start_cmd,
            stop_cmd: definition.stop_cmd,
            status_cmd: definition.status_cmd,
            base_path: definition.base_path,
            state: Mutex::new(LibraryState {
                ip,
                hostname,
                ..LibraryState::default()
            }),
            status_check_running: AtomicBool::new(false),
        }
    }

    /// Lock the state. Every critical section is a handful of field writes,
    /// so a poisoned lock still holds consistent data.
    pub fn state(&self) -> MutexGuard<'_, LibraryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn command(&self, action: LibraryAction) -> &str {
        match action {
            LibraryAction::Start => &self.start_cmd,
            LibraryAction::Stop => &self.stop_cmd,
            LibraryAction::Status => &self.status_cmd,
        }
    }

    pub fn status(&self) -> LibraryStatus {
        self.state().status
    }

    pub fn snapshot(&self) -> LibrarySnapshot {
        let state = self.state();
        LibrarySnapshot {
            name: self.name.clone(),
            status: state.status,
            nodes: self.nodes.clone(),
            ip: state.ip,
            hostname: state.hostname.clone(),
            local: state.locality.is_local(),
            login: state.locality.login().map(str::to_string),
            start_cmd: self.start_cmd.clone(),
            stop_cmd: self.stop_cmd.clone(),
            status_cmd: self.status_cmd.clone(),
            base_path: self.base_path.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Move to `to` if `attempt` is still the latest start or stop and the
    /// current status equals `expected` (any status when `expected` is
    /// `None`). Returns whether the status changed.
    pub fn transition(
        &self,
        events: &broadcast::Sender<LibraryEvent>,
        attempt: u64,
        expected: Option<LibraryStatus>,
        to: LibraryStatus,
    ) -> bool {
        let from = {
            let mut state = self.state();
            let from = state.status;
            if state.attempt != attempt || expected.is_some_and(|e| e != from) || from == to {
                return false;
            }
            state.status = to;
            from
        };
        self.announce(events, from, to);
        true
    }

    /// Broadcast a status change that already happened under the lock.
    pub fn announce(
        &self,
        events: &broadcast::Sender<LibraryEvent>,
        from: LibraryStatus,
        to: LibraryStatus,
    ) {
        info!("Library {}: {} -> {}", self.name, from, to);
        // No subscribers is fine.
        let _ = events.send(LibraryEvent::StatusChanged {
            library: self.name.clone(),
            from,
            to,
        });
    }

    pub fn record_failure(
        &self,
        events: &broadcast::Sender<LibraryEvent>,
        action: LibraryAction,
        err: &ControlError,
    ) {
        error!("Library {}: {} failed: {}", self.name, action, err);
        let failure = LibraryFailure::from_error(action, err);
        self.state().last_error = Some(failure.clone());
        let _ = events.send(LibraryEvent::CommandFailed {
            library: self.name.clone(),
            failure,
        });
    }

    /// Claim the status check slot. `None` while another check is running.
    pub fn try_begin_status_check(self: &Arc<Self>) -> Option<StatusCheckGuard> {
        self.status_check_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StatusCheckGuard(Arc::clone(self)))
    }

    #[cfg(test)]
    pub fn status_check_running(&self) -> bool {
        self.status_check_running.load(Ordering::Acquire)
    }
}

/// Releases the status check slot on drop, including when a worker panics.
pub(crate) struct StatusCheckGuard(Arc<LibraryEntry>);

impl Drop for StatusCheckGuard {
    fn drop(&mut self) {
        self.0.status_check_running.store(false, Ordering::Release);
    }
}

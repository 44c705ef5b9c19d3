//! Library state types shared by the tracker, events and snapshots.

use crate::error::ControlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Lifecycle status of a library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryStatus {
    #[default]
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl LibraryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryStatus::Stopped => "stopped",
            LibraryStatus::Starting => "starting",
            LibraryStatus::Started => "started",
            LibraryStatus::Stopping => "stopping",
        }
    }

    /// Whether a start or stop command is outstanding.
    pub fn is_transitional(&self) -> bool {
        matches!(self, LibraryStatus::Starting | LibraryStatus::Stopping)
    }
}

impl fmt::Display for LibraryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation performed on a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryAction {
    Start,
    Stop,
    Status,
}

impl LibraryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryAction::Start => "start",
            LibraryAction::Stop => "stop",
            LibraryAction::Status => "status",
        }
    }
}

impl fmt::Display for LibraryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a library's start and stop commands run.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Locality {
    #[default]
    Local,
    Remote { login: String, password: String },
}

impl Locality {
    pub fn is_local(&self) -> bool {
        matches!(self, Locality::Local)
    }

    pub fn login(&self) -> Option<&str> {
        match self {
            Locality::Local => None,
            Locality::Remote { login, .. } => Some(login),
        }
    }
}

impl fmt::Debug for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locality::Local => f.write_str("Local"),
            Locality::Remote { login, .. } => f
                .debug_struct("Remote")
                .field("login", login)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    CommandExecution,
    Authentication,
    Timeout,
    Other,
}

/// Last error raised by a library's worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryFailure {
    pub action: LibraryAction,
    pub kind: FailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl LibraryFailure {
    pub fn from_error(action: LibraryAction, err: &ControlError) -> Self {
        let kind = match err {
            ControlError::CommandExecution { .. } => FailureKind::CommandExecution,
            ControlError::Authentication { .. } => FailureKind::Authentication,
            ControlError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Other,
        };
        Self {
            action,
            kind,
            message: err.to_string(),
            at: Utc::now(),
        }
    }
}

/// Outcome of pointing a library at a new address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    /// The address belongs to this machine.
    Local { hostname: String },
    /// The address belongs to another machine.
    Remote { hostname: String },
    /// Reverse lookup failed; hostname cleared, locality unchanged.
    Unresolved { reason: String },
}

/// Read-only copy of a library's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySnapshot {
    pub name: String,
    pub status: LibraryStatus,
    pub nodes: Vec<String>,
    pub ip: Option<Ipv4Addr>,
    pub hostname: Option<String>,
    pub local: bool,
    pub login: Option<String>,
    pub start_cmd: String,
    pub stop_cmd: String,
    pub status_cmd: String,
    pub base_path: Option<PathBuf>,
    pub last_error: Option<LibraryFailure>,
}

/// Notification broadcast by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    StatusChanged {
        library: String,
        from: LibraryStatus,
        to: LibraryStatus,
    },
    CommandFailed {
        library: String,
        failure: LibraryFailure,
    },
}

impl LibraryEvent {
    pub fn library(&self) -> &str {
        match self {
            LibraryEvent::StatusChanged { library, .. } => library,
            LibraryEvent::CommandFailed { library, .. } => library,
        }
    }
}

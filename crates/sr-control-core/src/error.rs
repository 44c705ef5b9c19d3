//! Error types for the library tracker.
//!
//! Validation errors are returned synchronously to the caller. Execution and
//! authentication errors raised inside workers are recorded on the library
//! (see [`crate::library::LibraryFailure`]) and broadcast as events.

use crate::library::{LibraryAction, LibraryStatus};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the tracker and its backends.
#[derive(Debug, Error)]
pub enum ControlError {
    // Target errors
    #[error("Invalid IPv4 address: {address:?}")]
    InvalidAddress { address: String },

    #[error("Name resolution failed for {query}: {message}")]
    NameResolution { query: String, message: String },

    // Execution errors
    #[error("Command `{command}` failed: {message}")]
    CommandExecution {
        command: String,
        message: String,
        /// Exit code when the process ran to completion.
        exit_code: Option<i32>,
    },

    #[error("Authentication failed for {login}@{host}: {message}")]
    Authentication {
        host: String,
        login: String,
        message: String,
    },

    #[error("Command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    // Registry errors
    #[error("Library not found: {name}")]
    LibraryNotFound { name: String },

    #[error("Library {library} has no {action} command")]
    MissingCommand {
        library: String,
        action: LibraryAction,
    },

    #[error("Cannot {action} library {library} while it is {status}")]
    InvalidTransition {
        library: String,
        action: LibraryAction,
        status: LibraryStatus,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, ControlError>;

impl From<std::io::Error> for ControlError {
    fn from(err: std::io::Error) -> Self {
        ControlError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ControlError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ControlError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a command execution error for a process that could not be run.
    pub fn spawn_failed(command: &str, err: std::io::Error) -> Self {
        ControlError::CommandExecution {
            command: command.to_string(),
            message: format!("failed to spawn: {}", err),
            exit_code: None,
        }
    }

    /// Check if retrying the same operation may succeed.
    ///
    /// Authentication failures are not retryable: the credentials must change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ControlError::Timeout { .. }
                | ControlError::CommandExecution { .. }
                | ControlError::NameResolution { .. }
        )
    }
}

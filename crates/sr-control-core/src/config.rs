//! Centralized configuration for the library tracker.
//!
//! Timeouts, remote shell settings, polling cadence and on-disk locations.
//! Per-tracker overrides go through [`crate::TrackerBuilder`].

use std::time::Duration;

/// Bounds on command execution.
pub struct ExecutionConfig;

impl ExecutionConfig {
    /// Start and stop commands. Launch wrappers are expected to return once
    /// the launch is dispatched.
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
    /// Status queries (`rosnode list` and friends).
    pub const STATUS_TIMEOUT: Duration = Duration::from_secs(15);
    /// Whole credential check, including the SSH handshake.
    pub const CREDENTIAL_CHECK_TIMEOUT: Duration = Duration::from_secs(20);
}

/// Remote shell settings.
pub struct SshConfig;

impl SshConfig {
    pub const SSH_BINARY: &'static str = "ssh";
    pub const SSHPASS_BINARY: &'static str = "sshpass";
    /// Environment variable sshpass reads the password from with `-e`.
    pub const SSHPASS_ENV: &'static str = "SSHPASS";
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Command run remotely to verify a login.
    pub const PROBE_COMMAND: &'static str = "true";
    /// sshpass: the password was rejected.
    pub const SSHPASS_EXIT_BAD_PASSWORD: i32 = 5;
    /// ssh: connection or authentication error.
    pub const SSH_EXIT_ERROR: i32 = 255;
}

/// Status polling configuration.
pub struct PollConfig;

impl PollConfig {
    pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(4000);
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// Directory and file name configuration.
pub struct PathsConfig;

impl PathsConfig {
    pub const CONFIG_DIR_NAME: &'static str = "sr-control";
    pub const CATALOG_DIR_NAME: &'static str = "libraries";
    pub const CATALOG_EXTENSION: &'static str = "json";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(ExecutionConfig::STATUS_TIMEOUT < ExecutionConfig::COMMAND_TIMEOUT);
        assert!(SshConfig::CONNECT_TIMEOUT < ExecutionConfig::CREDENTIAL_CHECK_TIMEOUT);
        assert!(PollConfig::STATUS_POLL_INTERVAL > Duration::ZERO);
    }
}

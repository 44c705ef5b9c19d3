//! Command execution trait and shared types.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

/// Authenticated remote host.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub address: Ipv4Addr,
    pub login: String,
    pub password: String,
}

impl RemoteHost {
    pub fn new(address: Ipv4Addr, login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address,
            login: login.into(),
            password: password.into(),
        }
    }

    /// `login@address` destination for the remote shell.
    pub fn destination(&self) -> String {
        if self.login.is_empty() {
            self.address.to_string()
        } else {
            format!("{}@{}", self.login, self.address)
        }
    }
}

impl fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHost")
            .field("address", &self.address)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    Local,
    Remote(RemoteHost),
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTarget::Local => write!(f, "local"),
            ExecutionTarget::Remote(host) => write!(f, "{}", host.destination()),
        }
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout split into lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    pub(crate) fn from_std(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs library commands on a target.
///
/// Implementations must bound every invocation by `timeout` and release any
/// session they open before returning, whatever the outcome.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` on `target` and capture its output.
    ///
    /// A command that runs to completion returns `Ok` whatever its exit code;
    /// spawn failures, timeouts and remote login failures are errors.
    async fn execute(
        &self,
        target: &ExecutionTarget,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput>;

    /// Open an authenticated session to `host` and close it again.
    async fn check_credentials(&self, host: &RemoteHost, timeout: Duration) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_host_debug_redacts_password() {
        let host = RemoteHost::new(Ipv4Addr::new(10, 0, 0, 2), "hand", "s3cret");
        let debug = format!("{:?}", host);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("hand"));
    }

    #[test]
    fn test_destination() {
        let host = RemoteHost::new(Ipv4Addr::new(10, 0, 0, 2), "hand", "");
        assert_eq!(host.destination(), "hand@10.0.0.2");
        let anonymous = RemoteHost::new(Ipv4Addr::new(10, 0, 0, 2), "", "");
        assert_eq!(anonymous.destination(), "10.0.0.2");
    }

    #[test]
    fn test_output_lines() {
        let output = CommandOutput {
            exit_code: Some(0),
            stdout: "/rosout\n/hand_driver\n".into(),
            stderr: String::new(),
        };
        assert!(output.success());
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["/rosout", "/hand_driver"]);
    }
}

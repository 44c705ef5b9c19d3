//! Command execution backends.
//!
//! Library commands run either on this machine or on a remote host over SSH.
//! Both paths sit behind the [`CommandExecutor`] trait so the tracker
//! dispatches on an [`ExecutionTarget`] instead of branching on locality, and
//! tests can substitute their own executor.

mod local;
mod ssh;
mod traits;

pub use local::LocalRunner;
pub use ssh::SshRunner;
pub use traits::{CommandExecutor, CommandOutput, ExecutionTarget, RemoteHost};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Executor backed by real subprocesses and the system SSH client.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    local: LocalRunner,
    ssh: SshRunner,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom SSH runner.
    pub fn with_ssh(mut self, ssh: SshRunner) -> Self {
        self.ssh = ssh;
        self
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn execute(
        &self,
        target: &ExecutionTarget,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match target {
            ExecutionTarget::Local => self.local.run(command, working_dir, timeout).await,
            // The remote login shell starts in the user's home directory.
            ExecutionTarget::Remote(host) => self.ssh.run(host, command, timeout).await,
        }
    }

    async fn check_credentials(&self, host: &RemoteHost, timeout: Duration) -> Result<()> {
        self.ssh.check_credentials(host, timeout).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_target_runs_locally() {
        let executor = SystemExecutor::new();
        let output = executor
            .execute(
                &ExecutionTarget::Local,
                "echo /hand_driver",
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["/hand_driver"]);
    }
}

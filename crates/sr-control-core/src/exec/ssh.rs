//! Remote execution over the system `ssh` client.
//!
//! Password logins go through `sshpass -e`, which reads the password from
//! the `SSHPASS` environment variable so it never appears in the process
//! table. Logins without a password use key authentication in batch mode.
//! Every invocation is its own session: the session ends when the process
//! exits, and a timed-out process is killed.

use super::traits::{CommandOutput, RemoteHost};
use crate::config::SshConfig;
use crate::error::{ControlError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands on a remote host.
#[derive(Debug, Clone)]
pub struct SshRunner {
    connect_timeout: Duration,
}

impl Default for SshRunner {
    fn default() -> Self {
        Self {
            connect_timeout: SshConfig::CONNECT_TIMEOUT,
        }
    }
}

impl SshRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SSH handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Program to spawn for `host`.
    fn program(host: &RemoteHost) -> &'static str {
        if host.password.is_empty() {
            SshConfig::SSH_BINARY
        } else {
            SshConfig::SSHPASS_BINARY
        }
    }

    /// Arguments passed to [`Self::program`].
    fn args(&self, host: &RemoteHost, remote_command: &str) -> Vec<String> {
        let mut args = Vec::new();
        if !host.password.is_empty() {
            args.push("-e".to_string());
            args.push(SshConfig::SSH_BINARY.to_string());
            args.extend(
                [
                    "PreferredAuthentications=password,keyboard-interactive",
                    "PubkeyAuthentication=no",
                    "NumberOfPasswordPrompts=1",
                ]
                .iter()
                .flat_map(|opt| ["-o".to_string(), opt.to_string()]),
            );
        } else {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        args.push("-o".to_string());
        args.push("StrictHostKeyChecking=accept-new".to_string());
        args.push("-o".to_string());
        args.push(format!(
            "ConnectTimeout={}",
            self.connect_timeout.as_secs().max(1)
        ));
        args.push("-T".to_string());
        args.push(host.destination());
        args.push(remote_command.to_string());
        args
    }

    /// Run `remote_command` on `host`.
    pub async fn run(
        &self,
        host: &RemoteHost,
        remote_command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(Self::program(host));
        cmd.args(self.args(host, remote_command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !host.password.is_empty() {
            cmd.env(SshConfig::SSHPASS_ENV, &host.password);
        }

        debug!("Running `{}` on {}", remote_command, host.destination());
        let child = cmd
            .spawn()
            .map_err(|e| ControlError::spawn_failed(Self::program(host), e))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ControlError::Timeout {
                command: remote_command.to_string(),
                timeout,
            })?
            .map_err(|e| ControlError::CommandExecution {
                command: remote_command.to_string(),
                message: format!("failed to collect ssh output: {}", e),
                exit_code: None,
            })?;

        classify(host, remote_command, CommandOutput::from_std(output))
    }

    /// Log in to `host`, run a no-op and disconnect.
    pub async fn check_credentials(&self, host: &RemoteHost, timeout: Duration) -> Result<()> {
        let output = self.run(host, SshConfig::PROBE_COMMAND, timeout).await?;
        if output.success() {
            Ok(())
        } else {
            warn!(
                "Login probe on {} exited with {:?}",
                host.destination(),
                output.exit_code
            );
            Err(ControlError::CommandExecution {
                command: SshConfig::PROBE_COMMAND.to_string(),
                message: output.stderr.trim().to_string(),
                exit_code: output.exit_code,
            })
        }
    }
}

/// Separate session failures from the remote command's own exit status.
fn classify(host: &RemoteHost, command: &str, output: CommandOutput) -> Result<CommandOutput> {
    let stderr = output.stderr.trim();
    match output.exit_code {
        Some(SshConfig::SSHPASS_EXIT_BAD_PASSWORD) if !host.password.is_empty() => {
            Err(ControlError::Authentication {
                host: host.address.to_string(),
                login: host.login.clone(),
                message: "password rejected".to_string(),
            })
        }
        Some(SshConfig::SSH_EXIT_ERROR) if stderr.contains("Permission denied") => {
            Err(ControlError::Authentication {
                host: host.address.to_string(),
                login: host.login.clone(),
                message: stderr.to_string(),
            })
        }
        Some(SshConfig::SSH_EXIT_ERROR) => Err(ControlError::CommandExecution {
            command: command.to_string(),
            message: format!("ssh session to {} failed: {}", host.address, stderr),
            exit_code: output.exit_code,
        }),
        _ => Ok(output),
    }
}

//! Local subprocess execution.

use super::traits::CommandOutput;
use crate::error::{ControlError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs command lines on the local machine.
///
/// The command line is split on whitespace into a program and its arguments
/// and executed directly, without a shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

impl LocalRunner {
    pub async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or_else(|| ControlError::CommandExecution {
            command: command.to_string(),
            message: "empty command line".to_string(),
            exit_code: None,
        })?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        debug!("Running local command: {}", command);
        let child = cmd
            .spawn()
            .map_err(|e| ControlError::spawn_failed(command, e))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ControlError::Timeout {
                command: command.to_string(),
                timeout,
            })?
            .map_err(|e| ControlError::CommandExecution {
                command: command.to_string(),
                message: format!("failed to collect output: {}", e),
                exit_code: None,
            })?;

        let output = CommandOutput::from_std(output);
        debug!(
            "Local command `{}` exited with {:?}",
            command, output.exit_code
        );
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = LocalRunner
            .run("echo /rosout /hand", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "/rosout /hand");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code() {
        let output = LocalRunner
            .run("false", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_run_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hand.launch"), "").unwrap();

        let output = LocalRunner
            .run("ls", Some(dir.path()), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.stdout.contains("hand.launch"));
    }

    #[tokio::test]
    async fn test_missing_program_is_execution_error() {
        let err = LocalRunner
            .run("definitely-not-a-ros-tool-1234", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandExecution { exit_code: None, .. }));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let err = LocalRunner
            .run("   ", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::CommandExecution { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let err = LocalRunner
            .run("sleep 5", None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Timeout { .. }));
    }
}

//! Library definition schema.
//!
//! Defines the structure of library catalog JSON files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Remote machine a library should run on.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDefinition {
    /// IPv4 address of the machine.
    pub ip: String,
    #[serde(default)]
    pub login: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl std::fmt::Debug for TargetDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetDefinition")
            .field("ip", &self.ip)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to register a library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDefinition {
    /// Unique library name.
    pub name: String,
    /// Node names expected in the status command output while running.
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub start_cmd: String,
    #[serde(default)]
    pub stop_cmd: String,
    #[serde(default)]
    pub status_cmd: String,
    /// Working directory for local commands.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Machine to run on; the local machine when absent.
    #[serde(default)]
    pub target: Option<TargetDefinition>,
}

impl LibraryDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_start_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.start_cmd = cmd.into();
        self
    }

    pub fn with_stop_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.stop_cmd = cmd.into();
        self
    }

    pub fn with_status_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.status_cmd = cmd.into();
        self
    }

    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn with_target(
        mut self,
        ip: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.target = Some(TargetDefinition {
            ip: ip.into(),
            login: login.into(),
            password: password.into(),
        });
        self
    }
}

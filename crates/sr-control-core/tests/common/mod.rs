//! Test doubles for the command executor and host resolver.

#![allow(dead_code)]

use async_trait::async_trait;
use sr_control_core::{
    CommandExecutor, CommandOutput, ControlError, ExecutionTarget, HostResolver, LibraryTracker,
    RemoteHost, Result,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const LOCAL_HOSTNAME: &str = "lab-pc";
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const HAND_HOSTNAME: &str = "hand-pc";
pub const HAND_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

/// What a mocked command does when run.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Output { stdout: String, exit_code: i32 },
    SpawnFailure,
    AuthFailure,
    Timeout,
}

impl Default for MockOutcome {
    fn default() -> Self {
        MockOutcome::Output {
            stdout: String::new(),
            exit_code: 0,
        }
    }
}

impl MockOutcome {
    pub fn stdout(stdout: &str) -> Self {
        MockOutcome::Output {
            stdout: stdout.to_string(),
            exit_code: 0,
        }
    }

    pub fn exit(code: i32) -> Self {
        MockOutcome::Output {
            stdout: String::new(),
            exit_code: code,
        }
    }
}

/// One recorded `execute` call.
#[derive(Debug, Clone)]
pub struct Call {
    pub target: ExecutionTarget,
    pub command: String,
}

/// Executor that records calls and replays scripted outcomes.
#[derive(Default)]
pub struct MockExecutor {
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<Call>>,
    logins: Mutex<Vec<(Ipv4Addr, String, String)>>,
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_outcome(&self, command: &str, outcome: MockOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(command.to_string(), outcome);
    }

    /// Make `command` block until the returned gate is notified.
    pub fn hold(&self, command: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(command.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn accept_login(&self, address: Ipv4Addr, login: &str, password: &str) {
        self.logins
            .lock()
            .unwrap()
            .push((address, login.to_string(), password.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, command: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.command == command)
            .count()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(
        &self,
        target: &ExecutionTarget,
        command: &str,
        _working_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(Call {
            target: target.clone(),
            command: command.to_string(),
        });

        let gate = self.gates.lock().unwrap().get(command).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default();
        match outcome {
            MockOutcome::Output { stdout, exit_code } => Ok(CommandOutput {
                exit_code: Some(exit_code),
                stdout,
                stderr: if exit_code == 0 {
                    String::new()
                } else {
                    "mock failure".to_string()
                },
            }),
            MockOutcome::SpawnFailure => Err(ControlError::spawn_failed(
                command,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            )),
            MockOutcome::AuthFailure => Err(ControlError::Authentication {
                host: target.to_string(),
                login: "hand".to_string(),
                message: "Permission denied".to_string(),
            }),
            MockOutcome::Timeout => Err(ControlError::Timeout {
                command: command.to_string(),
                timeout,
            }),
        }
    }

    async fn check_credentials(&self, host: &RemoteHost, _timeout: Duration) -> Result<()> {
        let accepted = self
            .logins
            .lock()
            .unwrap()
            .iter()
            .any(|(addr, login, password)| {
                *addr == host.address && *login == host.login && *password == host.password
            });
        if accepted {
            Ok(())
        } else {
            Err(ControlError::Authentication {
                host: host.address.to_string(),
                login: host.login.clone(),
                message: "Permission denied".to_string(),
            })
        }
    }
}

/// Resolver over a fixed host table.
pub struct MockResolver {
    pub hostname: String,
    pub local_ip: Option<Ipv4Addr>,
    pub hosts: HashMap<Ipv4Addr, String>,
}

impl MockResolver {
    /// This machine is `lab-pc` at 10.0.0.1; `hand-pc` is 10.0.0.2.
    pub fn lab() -> Arc<Self> {
        let mut hosts = HashMap::new();
        hosts.insert(LOCAL_IP, LOCAL_HOSTNAME.to_string());
        hosts.insert(HAND_IP, HAND_HOSTNAME.to_string());
        Arc::new(Self {
            hostname: LOCAL_HOSTNAME.to_string(),
            local_ip: Some(LOCAL_IP),
            hosts,
        })
    }

    /// Nothing resolves.
    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            hostname: LOCAL_HOSTNAME.to_string(),
            local_ip: None,
            hosts: HashMap::new(),
        })
    }
}

#[async_trait]
impl HostResolver for MockResolver {
    async fn local_hostname(&self) -> Result<String> {
        Ok(self.hostname.clone())
    }

    async fn local_ip(&self) -> Result<Ipv4Addr> {
        self.local_ip.ok_or_else(|| ControlError::NameResolution {
            query: self.hostname.clone(),
            message: "offline".to_string(),
        })
    }

    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Result<String> {
        self.hosts
            .get(&ip)
            .cloned()
            .ok_or_else(|| ControlError::NameResolution {
                query: ip.to_string(),
                message: "unknown host".to_string(),
            })
    }
}

/// Tracker wired to the given mocks.
pub fn tracker(executor: &Arc<MockExecutor>, resolver: Arc<MockResolver>) -> LibraryTracker {
    LibraryTracker::builder()
        .with_executor(Arc::clone(executor) as Arc<dyn CommandExecutor>)
        .with_resolver(resolver)
        .build()
}

//! Registry of libraries and the workers that start, stop and query them.

use super::entry::LibraryEntry;
use super::status::{all_nodes_present, reconcile};
use super::types::{
    LibraryAction, LibraryEvent, LibraryFailure, LibrarySnapshot, LibraryStatus, Locality,
    TargetResolution,
};
use crate::catalog::{LibraryDefinition, TargetDefinition};
use crate::config::{ExecutionConfig, PollConfig};
use crate::error::{ControlError, Result};
use crate::exec::{CommandExecutor, ExecutionTarget, RemoteHost, SystemExecutor};
use crate::identity::{parse_ipv4, HostResolver, SystemResolver};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a spawned start, stop or status worker.
///
/// Dropping the handle detaches the worker; awaiting [`WorkerHandle::wait`]
/// yields the library status once the worker is done.
#[derive(Debug)]
pub struct WorkerHandle {
    library: String,
    action: LibraryAction,
    handle: JoinHandle<LibraryStatus>,
}

impl WorkerHandle {
    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn action(&self) -> LibraryAction {
        self.action
    }

    /// Wait for the worker and return the status it left behind.
    pub async fn wait(self) -> Result<LibraryStatus> {
        self.handle.await.map_err(|e| {
            ControlError::Other(format!(
                "{} worker for {} failed: {}",
                self.action, self.library, e
            ))
        })
    }
}

/// Builder for [`LibraryTracker`].
pub struct TrackerBuilder {
    executor: Option<Arc<dyn CommandExecutor>>,
    resolver: Option<Arc<dyn HostResolver>>,
    command_timeout: Duration,
    status_timeout: Duration,
    credential_timeout: Duration,
    event_capacity: usize,
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self {
            executor: None,
            resolver: None,
            command_timeout: ExecutionConfig::COMMAND_TIMEOUT,
            status_timeout: ExecutionConfig::STATUS_TIMEOUT,
            credential_timeout: ExecutionConfig::CREDENTIAL_CHECK_TIMEOUT,
            event_capacity: PollConfig::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl TrackerBuilder {
    /// Set the command executor (defaults to [`SystemExecutor`]).
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the host resolver (defaults to [`SystemResolver`]).
    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Bound on start and stop commands.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Bound on status commands.
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Bound on credential checks.
    pub fn with_credential_timeout(mut self, timeout: Duration) -> Self {
        self.credential_timeout = timeout;
        self
    }

    /// Number of events buffered per subscriber before the oldest are dropped.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> LibraryTracker {
        let (events, _) = broadcast::channel(self.event_capacity);
        LibraryTracker {
            libraries: RwLock::new(HashMap::new()),
            executor: self
                .executor
                .unwrap_or_else(|| Arc::new(SystemExecutor::new())),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(SystemResolver)),
            events,
            command_timeout: self.command_timeout,
            status_timeout: self.status_timeout,
            credential_timeout: self.credential_timeout,
        }
    }
}

/// Tracks named libraries and their lifecycle status.
///
/// Start, stop and status operations return as soon as their worker is
/// spawned. Workers write status through per-library compare-and-set
/// transitions, so a status check finishing during a start cannot undo it.
/// Every start and stop supersedes the one before it, and a superseded worker
/// finishing late leaves the status alone.
/// Worker failures are kept as the library's last error and broadcast to
/// event subscribers (see [`LibraryTracker::subscribe`]).
pub struct LibraryTracker {
    libraries: RwLock<HashMap<String, Arc<LibraryEntry>>>,
    executor: Arc<dyn CommandExecutor>,
    resolver: Arc<dyn HostResolver>,
    events: broadcast::Sender<LibraryEvent>,
    command_timeout: Duration,
    status_timeout: Duration,
    credential_timeout: Duration,
}

impl Default for LibraryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryTracker {
    /// Tracker running real commands and resolving names through the OS.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::default()
    }

    // ========================================
    // Registration
    // ========================================

    /// Register a library, replacing any library with the same name.
    ///
    /// The library starts out local and stopped, with this machine's address
    /// and hostname when they resolve. A target in the definition is applied
    /// afterwards as by [`LibraryTracker::set_target`]; its address is
    /// validated before anything is registered.
    pub async fn register(&self, definition: LibraryDefinition) -> Result<LibrarySnapshot> {
        if definition.name.trim().is_empty() {
            return Err(ControlError::Config {
                message: "Library name must not be empty".to_string(),
            });
        }
        let target = definition.target.clone();
        if let Some(ref target) = target {
            parse_ipv4(&target.ip)?;
        }

        let (ip, hostname) = self.local_identity().await;
        let name = definition.name.clone();
        let entry = Arc::new(LibraryEntry::new(definition, ip, hostname));

        let replaced = self.write_libraries().insert(name.clone(), entry).is_some();
        if replaced {
            warn!("Library {} re-registered; previous definition replaced", name);
        } else {
            info!("Registered library {}", name);
        }

        if let Some(TargetDefinition {
            ip,
            login,
            password,
        }) = target
        {
            self.set_target(&name, &ip, &login, &password).await?;
        }

        self.get(&name)
            .ok_or(ControlError::LibraryNotFound { name })
    }

    /// Register every definition in order. Returns how many were registered.
    pub async fn register_catalog(
        &self,
        definitions: impl IntoIterator<Item = LibraryDefinition>,
    ) -> Result<usize> {
        let mut count = 0;
        for definition in definitions {
            self.register(definition).await?;
            count += 1;
        }
        Ok(count)
    }

    /// This machine's address and hostname, each `None` when unresolvable.
    async fn local_identity(&self) -> (Option<Ipv4Addr>, Option<String>) {
        let ip = match self.resolver.local_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Could not resolve local address: {}", e);
                return (None, None);
            }
        };
        match self.resolver.reverse_lookup(ip).await {
            Ok(hostname) => (Some(ip), Some(hostname)),
            Err(e) => {
                warn!("Could not resolve hostname of {}: {}", ip, e);
                (Some(ip), None)
            }
        }
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Run the start command.
    ///
    /// The library must be stopped. It is `starting` when this returns and
    /// becomes `started` once the start command exits successfully. The
    /// command returning is taken as the launch having happened; the nodes
    /// are not checked. On failure the library goes back to `stopped`.
    pub async fn start(&self, name: &str) -> Result<WorkerHandle> {
        let entry = self.entry(name)?;
        Self::require_command(&entry, LibraryAction::Start)?;

        let (attempt, target) = {
            let mut state = entry.state();
            if state.status != LibraryStatus::Stopped {
                return Err(ControlError::InvalidTransition {
                    library: entry.name.clone(),
                    action: LibraryAction::Start,
                    status: state.status,
                });
            }
            state.status = LibraryStatus::Starting;
            state.last_error = None;
            (state.begin_attempt(), state.execution_target())
        };
        entry.announce(&self.events, LibraryStatus::Stopped, LibraryStatus::Starting);
        debug!("Dispatching start of {} on {}", entry.name, target);

        let executor = Arc::clone(&self.executor);
        let events = self.events.clone();
        let timeout = self.command_timeout;
        let worker = Arc::clone(&entry);
        let handle = tokio::spawn(async move {
            let entry = worker;
            match run_to_success(executor.as_ref(), &entry, LibraryAction::Start, &target, timeout)
                .await
            {
                Ok(()) => {
                    if !entry.transition(
                        &events,
                        attempt,
                        Some(LibraryStatus::Starting),
                        LibraryStatus::Started,
                    ) {
                        debug!(
                            "Start of {} finished after it was superseded (now {})",
                            entry.name,
                            entry.status()
                        );
                    }
                }
                Err(e) => {
                    entry.record_failure(&events, LibraryAction::Start, &e);
                    entry.transition(
                        &events,
                        attempt,
                        Some(LibraryStatus::Starting),
                        LibraryStatus::Stopped,
                    );
                }
            }
            entry.status()
        });

        Ok(WorkerHandle {
            library: entry.name.clone(),
            action: LibraryAction::Start,
            handle,
        })
    }

    /// Run the stop command.
    ///
    /// Allowed from any status. A start or stop still in flight is
    /// superseded and no longer writes status when it finishes. The library is `stopping` when this returns
    /// and `stopped` once the stop command has run, whatever its exit code (a
    /// non-zero exit is still recorded as the last error). If the command
    /// could not run at all, the prior status is restored, or `stopped` when
    /// the prior status was itself transitional.
    pub async fn stop(&self, name: &str) -> Result<WorkerHandle> {
        let entry = self.entry(name)?;
        Self::require_command(&entry, LibraryAction::Stop)?;

        let (prior, attempt, target) = {
            let mut state = entry.state();
            let prior = state.status;
            state.status = LibraryStatus::Stopping;
            state.last_error = None;
            (prior, state.begin_attempt(), state.execution_target())
        };
        if prior != LibraryStatus::Stopping {
            entry.announce(&self.events, prior, LibraryStatus::Stopping);
        }
        debug!("Dispatching stop of {} on {}", entry.name, target);

        let executor = Arc::clone(&self.executor);
        let events = self.events.clone();
        let timeout = self.command_timeout;
        let worker = Arc::clone(&entry);
        let handle = tokio::spawn(async move {
            let entry = worker;
            let result = executor
                .execute(
                    &target,
                    &entry.stop_cmd,
                    entry.base_path.as_deref(),
                    timeout,
                )
                .await;
            match result {
                Ok(output) => {
                    if !output.success() {
                        entry.record_failure(
                            &events,
                            LibraryAction::Stop,
                            &exit_failure(&entry.stop_cmd, &output),
                        );
                    }
                    entry.transition(&events, attempt, None, LibraryStatus::Stopped);
                }
                Err(e) => {
                    entry.record_failure(&events, LibraryAction::Stop, &e);
                    let fallback = if prior.is_transitional() {
                        LibraryStatus::Stopped
                    } else {
                        prior
                    };
                    entry.transition(&events, attempt, Some(LibraryStatus::Stopping), fallback);
                }
            }
            entry.status()
        });

        Ok(WorkerHandle {
            library: entry.name.clone(),
            action: LibraryAction::Stop,
            handle,
        })
    }

    /// Run the status command and reconcile the status with its output.
    ///
    /// Returns `None` without running anything when a status check for this
    /// library is still in flight. The status command always runs on this
    /// machine: node listings go through the ROS master, which is reachable
    /// from here whichever machine runs the library.
    pub async fn query_status(&self, name: &str) -> Result<Option<WorkerHandle>> {
        let entry = self.entry(name)?;
        Self::require_command(&entry, LibraryAction::Status)?;

        let Some(guard) = entry.try_begin_status_check() else {
            debug!("Status check for {} already running", entry.name);
            return Ok(None);
        };

        let executor = Arc::clone(&self.executor);
        let events = self.events.clone();
        let timeout = self.status_timeout;
        let worker = Arc::clone(&entry);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let entry = worker;
            let result = executor
                .execute(
                    &ExecutionTarget::Local,
                    &entry.status_cmd,
                    entry.base_path.as_deref(),
                    timeout,
                )
                .await;
            match result {
                Ok(output) => {
                    let present = all_nodes_present(output.lines(), &entry.nodes);
                    let change = {
                        let mut state = entry.state();
                        let from = state.status;
                        reconcile(from, present).map(|to| {
                            state.status = to;
                            (from, to)
                        })
                    };
                    match change {
                        Some((from, to)) => entry.announce(&events, from, to),
                        None => debug!(
                            "Status check for {}: nodes present = {}, status unchanged",
                            entry.name, present
                        ),
                    }
                }
                Err(e) => entry.record_failure(&events, LibraryAction::Status, &e),
            }
            entry.status()
        });

        Ok(Some(WorkerHandle {
            library: entry.name.clone(),
            action: LibraryAction::Status,
            handle,
        }))
    }

    fn require_command(entry: &LibraryEntry, action: LibraryAction) -> Result<()> {
        if entry.command(action).trim().is_empty() {
            return Err(ControlError::MissingCommand {
                library: entry.name.clone(),
                action,
            });
        }
        Ok(())
    }

    // ========================================
    // Targets
    // ========================================

    /// Point a library at the machine with address `ip`.
    ///
    /// A malformed address is rejected and nothing changes. Otherwise the
    /// address is stored and reverse-resolved: a hostname other than this
    /// machine's makes the library remote with the given credentials; this
    /// machine's hostname makes it local and drops any credentials. When the
    /// lookup fails the hostname is cleared and locality and credentials are
    /// left as they were.
    pub async fn set_target(
        &self,
        name: &str,
        ip: &str,
        login: &str,
        password: &str,
    ) -> Result<TargetResolution> {
        let entry = self.entry(name)?;
        let address = parse_ipv4(ip)?;

        let lookup = match self.resolver.reverse_lookup(address).await {
            Ok(hostname) => self
                .resolver
                .local_hostname()
                .await
                .map(|local| (hostname, local)),
            Err(e) => Err(e),
        };

        let mut state = entry.state();
        state.ip = Some(address);
        let resolution = match lookup {
            Ok((hostname, local)) => {
                let is_local = address.is_loopback() || same_host(&hostname, &local);
                state.hostname = Some(hostname.clone());
                if is_local {
                    state.locality = Locality::Local;
                    TargetResolution::Local { hostname }
                } else {
                    state.locality = Locality::Remote {
                        login: login.to_string(),
                        password: password.to_string(),
                    };
                    TargetResolution::Remote { hostname }
                }
            }
            Err(e) => {
                warn!(
                    "Library {}: could not resolve {}, keeping locality: {}",
                    entry.name, address, e
                );
                state.hostname = None;
                TargetResolution::Unresolved {
                    reason: e.to_string(),
                }
            }
        };
        drop(state);

        info!("Library {} targets {} ({:?})", entry.name, address, resolution);
        Ok(resolution)
    }

    /// Check that `login`/`password` open a remote shell on `ip`.
    ///
    /// The session is closed again whatever the outcome. Malformed addresses
    /// and every connection or login failure yield `false`.
    pub async fn verify_credentials(&self, ip: &str, login: &str, password: &str) -> bool {
        let address = match parse_ipv4(ip) {
            Ok(address) => address,
            Err(e) => {
                warn!("Credential check skipped: {}", e);
                return false;
            }
        };
        let host = RemoteHost::new(address, login, password);
        match self
            .executor
            .check_credentials(&host, self.credential_timeout)
            .await
        {
            Ok(()) => {
                info!("Credentials accepted by {}", host.destination());
                true
            }
            Err(e) => {
                warn!("Credentials rejected by {}: {}", host.destination(), e);
                false
            }
        }
    }

    // ========================================
    // Queries
    // ========================================

    pub fn get(&self, name: &str) -> Option<LibrarySnapshot> {
        self.read_libraries().get(name).map(|e| e.snapshot())
    }

    /// Snapshots of all libraries, sorted by name.
    pub fn list(&self) -> Vec<LibrarySnapshot> {
        let mut snapshots: Vec<_> = self.read_libraries().values().map(|e| e.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Library names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.read_libraries().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn status(&self, name: &str) -> Option<LibraryStatus> {
        self.read_libraries().get(name).map(|e| e.status())
    }

    pub fn last_error(&self, name: &str) -> Option<LibraryFailure> {
        self.read_libraries()
            .get(name)
            .and_then(|e| e.state().last_error.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_libraries().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read_libraries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_libraries().is_empty()
    }

    /// Receive status changes and worker failures from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    fn entry(&self, name: &str) -> Result<Arc<LibraryEntry>> {
        self.read_libraries()
            .get(name)
            .cloned()
            .ok_or_else(|| ControlError::LibraryNotFound {
                name: name.to_string(),
            })
    }

    fn read_libraries(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<LibraryEntry>>> {
        self.libraries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_libraries(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<LibraryEntry>>> {
        self.libraries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run one of `entry`'s commands, treating a non-zero exit as a failure.
async fn run_to_success(
    executor: &dyn CommandExecutor,
    entry: &LibraryEntry,
    action: LibraryAction,
    target: &ExecutionTarget,
    timeout: Duration,
) -> Result<()> {
    let command = entry.command(action);
    let output = executor
        .execute(target, command, entry.base_path.as_deref(), timeout)
        .await?;
    if output.success() {
        Ok(())
    } else {
        Err(exit_failure(command, &output))
    }
}

fn exit_failure(command: &str, output: &crate::exec::CommandOutput) -> ControlError {
    let stderr = output.stderr.trim();
    ControlError::CommandExecution {
        command: command.to_string(),
        message: if stderr.is_empty() {
            format!("exited with {:?}", output.exit_code)
        } else {
            stderr.to_string()
        },
        exit_code: output.exit_code,
    }
}

/// Hostnames match ignoring case, or when one is the short form of the other.
fn same_host(a: &str, b: &str) -> bool {
    let short = |h: &str| h.split('.').next().unwrap_or(h).to_ascii_lowercase();
    a.eq_ignore_ascii_case(b) || short(a) == short(b)
}

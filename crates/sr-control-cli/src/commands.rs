//! Subcommand implementations.

use crate::output::{self, Format};
use anyhow::{bail, Context, Result};
use sr_control_core::config::{PathsConfig, PollConfig};
use sr_control_core::exec::SshRunner;
use sr_control_core::{
    CatalogLoader, LibraryEvent, LibraryFailure, LibraryTracker, StatusPoller, SystemExecutor,
    WorkerHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Catalog to load: the explicit path, or the default catalog directory.
pub fn catalog_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        dirs::config_dir().map(|dir| {
            dir.join(PathsConfig::CONFIG_DIR_NAME)
                .join(PathsConfig::CATALOG_DIR_NAME)
        })
    })
}

/// Tracker on the system executor, with an optional SSH connect timeout.
pub fn build_tracker(connect_timeout: Option<Duration>) -> LibraryTracker {
    let mut ssh = SshRunner::new();
    if let Some(timeout) = connect_timeout {
        ssh = ssh.with_connect_timeout(timeout);
    }
    LibraryTracker::builder()
        .with_executor(Arc::new(SystemExecutor::new().with_ssh(ssh)))
        .build()
}

/// Register every library in the catalog on `tracker`.
///
/// A catalog path that does not exist leaves the tracker empty.
pub async fn load_tracker(
    tracker: LibraryTracker,
    catalog: Option<&Path>,
) -> Result<Arc<LibraryTracker>> {
    let tracker = Arc::new(tracker);
    let Some(catalog) = catalog else {
        warn!("No configuration directory; starting with an empty catalog");
        return Ok(tracker);
    };
    if !catalog.exists() {
        warn!("Catalog {} not found", catalog.display());
        return Ok(tracker);
    }

    let definitions = CatalogLoader::load(catalog)
        .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
    let count = tracker.register_catalog(definitions).await?;
    info!("Loaded {} libraries from {}", count, catalog.display());
    Ok(tracker)
}

/// Read a password from `var`, empty when unset.
pub fn password_from_env(var: &str) -> String {
    match std::env::var(var) {
        Ok(password) => password,
        Err(_) => {
            debug!("{} not set; using an empty password", var);
            String::new()
        }
    }
}

pub fn list(tracker: &LibraryTracker, format: Format) -> Result<()> {
    output::print_snapshots(&tracker.list(), format)
}

pub async fn status(tracker: &LibraryTracker, name: Option<&str>, format: Format) -> Result<()> {
    let names = match name {
        Some(name) => vec![name.to_string()],
        None => tracker.names(),
    };

    let mut workers = Vec::new();
    for name in &names {
        match tracker.query_status(name).await {
            Ok(Some(worker)) => workers.push(worker),
            Ok(None) => {}
            Err(sr_control_core::ControlError::MissingCommand { .. }) if names.len() > 1 => {
                debug!("{} has no status command", name);
            }
            Err(e) => return Err(e.into()),
        }
    }
    for worker in workers {
        worker.wait().await?;
    }

    let snapshots: Vec<_> = names.iter().filter_map(|n| tracker.get(n)).collect();
    output::print_snapshots(&snapshots, format)
}

pub async fn start(tracker: &LibraryTracker, name: &str, format: Format) -> Result<()> {
    let worker = tracker.start(name).await?;
    finish(tracker, worker, format).await
}

pub async fn stop(tracker: &LibraryTracker, name: &str, format: Format) -> Result<()> {
    let worker = tracker.stop(name).await?;
    finish(tracker, worker, format).await
}

/// Wait for a start or stop worker, print the library and fail if it failed.
async fn finish(tracker: &LibraryTracker, worker: WorkerHandle, format: Format) -> Result<()> {
    let name = worker.library().to_string();
    let action = worker.action();
    worker.wait().await?;

    let snapshot = tracker
        .get(&name)
        .with_context(|| format!("Library {} disappeared", name))?;
    output::print_snapshot(&snapshot, format)?;

    match snapshot.last_error {
        Some(LibraryFailure { action: failed, ref message, .. }) if failed == action => {
            bail!("{} of {} failed: {}", action, name, message)
        }
        _ => Ok(()),
    }
}

pub async fn target(
    tracker: &LibraryTracker,
    name: &str,
    ip: &str,
    login: &str,
    password: &str,
    format: Format,
) -> Result<()> {
    let resolution = tracker.set_target(name, ip, login, password).await?;
    let snapshot = tracker
        .get(name)
        .with_context(|| format!("Library {} disappeared", name))?;
    output::print_resolution(&snapshot, &resolution, format)
}

pub async fn check_login(
    tracker: &LibraryTracker,
    ip: &str,
    login: &str,
    password: &str,
    format: Format,
) -> Result<()> {
    let accepted = tracker.verify_credentials(ip, login, password).await;
    output::print_login_check(ip, login, accepted, format)?;
    if !accepted {
        bail!("Login {}@{} rejected", login, ip);
    }
    Ok(())
}

/// Poll status and print events until Ctrl-C.
pub async fn watch(tracker: Arc<LibraryTracker>, interval_ms: u64, format: Format) -> Result<()> {
    let interval = if interval_ms == 0 {
        PollConfig::STATUS_POLL_INTERVAL
    } else {
        Duration::from_millis(interval_ms)
    };

    let mut events = tracker.subscribe();
    output::print_snapshots(&tracker.list(), format)?;
    let poller = StatusPoller::new(Arc::clone(&tracker))
        .with_interval(interval)
        .spawn();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown signal received, exiting");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event, format)?,
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    poller.stop().await;
    Ok(())
}

fn print_event(event: &LibraryEvent, format: Format) -> Result<()> {
    debug!("Event for {}", event.library());
    output::print_event(event, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_catalog_wins() {
        let path = PathBuf::from("/tmp/catalog.json");
        assert_eq!(catalog_path(Some(path.clone())), Some(path));
    }

    #[test]
    fn test_default_catalog_location() {
        if let Some(path) = catalog_path(None) {
            assert!(path.ends_with("sr-control/libraries"));
        }
    }

    #[test]
    fn test_password_from_unset_env() {
        assert_eq!(password_from_env("SR_CONTROL_TEST_UNSET_PASSWORD"), "");
    }

    #[tokio::test]
    async fn test_load_tracker_missing_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = load_tracker(build_tracker(None), Some(&dir.path().join("missing")))
            .await
            .unwrap();
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_load_tracker_rejects_invalid_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_tracker(build_tracker(Some(Duration::from_secs(3))), Some(&path))
            .await
            .is_err());
    }
}

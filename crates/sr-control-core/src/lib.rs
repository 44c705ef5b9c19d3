//! SR Control Core - headless lifecycle tracking for ROS libraries.
//!
//! Tracks named "libraries" (bundles of ROS nodes on the Shadow Robot lab
//! machines), starts and stops them on this machine or over SSH, and keeps
//! each one's status in step with the nodes actually running.
//!
//! For a command-line front end, see the `sr-control-cli` crate.
//!
//! # Modules
//!
//! - `library` - The tracker, its workers and the status poller
//! - `exec` - Local and SSH command execution
//! - `identity` - Hostname and address resolution
//! - `catalog` - Library definitions loaded from JSON

pub mod catalog;
pub mod config;
pub mod error;
pub mod exec;
pub mod identity;
pub mod library;

// Re-export commonly used types
pub use catalog::{CatalogLoader, LibraryDefinition, TargetDefinition};
pub use error::{ControlError, Result};
pub use exec::{CommandExecutor, CommandOutput, ExecutionTarget, RemoteHost, SystemExecutor};
pub use identity::{parse_ipv4, HostResolver, SystemResolver};
pub use library::{
    FailureKind, LibraryAction, LibraryEvent, LibraryFailure, LibrarySnapshot, LibraryStatus,
    LibraryTracker, Locality, PollerHandle, StatusPoller, TargetResolution, TrackerBuilder,
    WorkerHandle,
};

//! Library lifecycle tracking.
//!
//! A library is a named bundle of ROS software with commands to start it,
//! stop it and list its running nodes. The [`LibraryTracker`] keeps one entry
//! per library and moves it through
//! `stopped -> starting -> started -> stopping -> stopped` as workers finish.
//!
//! # Example
//!
//! ```rust,no_run
//! use sr_control_core::{LibraryDefinition, LibraryTracker};
//!
//! #[tokio::main]
//! async fn main() -> sr_control_core::Result<()> {
//!     let tracker = LibraryTracker::new();
//!     tracker
//!         .register(
//!             LibraryDefinition::new("shadow_hand")
//!                 .with_nodes(["/sr_hand"])
//!                 .with_start_cmd("roslaunch sr_hand srh_motor.launch")
//!                 .with_stop_cmd("rosnode kill /sr_hand")
//!                 .with_status_cmd("rosnode list"),
//!         )
//!         .await?;
//!
//!     let status = tracker.start("shadow_hand").await?.wait().await?;
//!     println!("shadow_hand is {}", status);
//!     Ok(())
//! }
//! ```

mod entry;
mod poller;
mod status;
mod tracker;
mod types;

pub use poller::{PollerHandle, StatusPoller};
pub use status::{all_nodes_present, reconcile};
pub use tracker::{LibraryTracker, TrackerBuilder, WorkerHandle};
pub use types::{
    FailureKind, LibraryAction, LibraryEvent, LibraryFailure, LibrarySnapshot, LibraryStatus,
    Locality, TargetResolution,
};

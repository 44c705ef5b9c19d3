//! Library catalog: definitions of the libraries to track.
//!
//! # Example
//!
//! ```json
//! [
//!   {
//!     "name": "shadow_hand",
//!     "nodes": ["/sr_hand", "/robot_state_publisher"],
//!     "startCmd": "roslaunch sr_hand srh_motor.launch",
//!     "stopCmd": "rosnode kill /sr_hand /robot_state_publisher",
//!     "statusCmd": "rosnode list",
//!     "target": { "ip": "10.0.0.2", "login": "hand", "password": "hand" }
//!   }
//! ]
//! ```

mod loader;
mod schema;

pub use loader::CatalogLoader;
pub use schema::{LibraryDefinition, TargetDefinition};

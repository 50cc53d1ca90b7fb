//! Domain services for moldtrack.
//!
//! Services hold the business rules and talk to storage only through the
//! traits in [`crate::store`].

pub mod location;
pub mod mold;
pub mod revision;
pub mod versioning;
pub mod workflow;

pub use location::{classify, distance_m, LocationHistory, LocationTracker, TrackingConfig};
pub use mold::{MoldService, MoldUpdate};
pub use revision::{diff, FieldChange, RevisionLog};
pub use versioning::{materialize, ChecklistService};
pub use workflow::{LifecycleProjection, WorkflowConfig, WorkflowEngine};

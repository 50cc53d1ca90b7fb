//! Repository implementations of the domain store traits.

pub mod checklist;
pub mod location_log;
pub mod mold;
pub mod revision;
pub mod transfer;

pub use checklist::ChecklistRepository;
pub use location_log::LocationLogRepository;
pub use mold::MoldRepository;
pub use revision::{append_revision_tx, RevisionRepository};
pub use transfer::TransferRepository;

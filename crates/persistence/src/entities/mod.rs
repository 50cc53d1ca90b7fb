//! Database entity definitions.
//!
//! Entities map rows one to one and convert into domain models.

pub mod checklist;
pub mod location_log;
pub mod mold;
pub mod revision;
pub mod transfer;

pub use checklist::{
    ChecklistItemEntity, ChecklistVersionEntity, InspectionCycleDb, ItemCycleEntity,
    VersionItemEntity,
};
pub use location_log::{LocationLogEntity, LocationStatusDb, ScanSourceDb};
pub use mold::{MoldEntity, MoldStageDb};
pub use revision::{RevisionEntity, RevisionEntityTypeDb};
pub use transfer::{
    ApprovalActionDb, ApprovalEventEntity, ChecklistAnswerEntity, CheckResultDb,
    TransferRequestEntity, TransferStateDb,
};

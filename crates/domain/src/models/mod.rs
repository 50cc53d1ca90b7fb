//! Domain models for moldtrack.

pub mod checklist;
pub mod location_log;
pub mod mold;
pub mod revision;
pub mod transfer;

pub use checklist::{
    ChecklistItem, ChecklistVersion, InspectionCycle, ItemCycle, MaterializedItem,
    NewChecklistItem, VersionDetail, VersionItem,
};
pub use location_log::{
    Coordinates, HistoryWindow, LocationHistoryPage, LocationLog, LocationStatus, NewLocationLog,
    ScanSource,
};
pub use mold::{Mold, MoldStage, NewMold};
pub use revision::{ChainReport, EntityRef, NewRevision, RevisionEntityType, RevisionRecord};
pub use transfer::{
    ApprovalAction, ApprovalEvent, ChecklistAnswer, CheckResult, ConsistencyReport, Decision,
    NewApprovalEvent, NewTransferRequest, StateChange, TransferRequest, TransferState,
    TransferView, WorkflowOp,
};

//! Data-access interfaces, one per component.
//!
//! Implementations must enforce the guards documented on each method inside
//! a single transaction; services call them without holding locks of their
//! own. `persistence` provides the PostgreSQL backend and [`memory`] an
//! in-process one.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::pagination::Cursor;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{
    ApprovalEvent, ChecklistAnswer, ChecklistItem, ChecklistVersion, EntityRef, HistoryWindow,
    ItemCycle, LocationLog, LocationStatus, Mold, NewApprovalEvent, NewChecklistItem,
    NewLocationLog, NewMold, NewRevision, NewTransferRequest, RevisionRecord, StateChange,
    TransferRequest, VersionItem,
};

pub use memory::InMemoryStore;

/// Checklist catalog and version store.
#[async_trait]
pub trait ChecklistStore: Send + Sync {
    async fn create_item(&self, item: NewChecklistItem) -> Result<ChecklistItem, DomainError>;

    async fn find_item(&self, id: i64) -> Result<Option<ChecklistItem>, DomainError>;

    async fn list_items(&self, active_only: bool) -> Result<Vec<ChecklistItem>, DomainError>;

    /// Catalog items mapped into the version, active or not.
    async fn items_for_version(&self, version_id: i64) -> Result<Vec<ChecklistItem>, DomainError>;

    async fn set_item_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<ChecklistItem>, DomainError>;

    /// Fails with `Conflict` when the label is taken.
    async fn create_version(
        &self,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError>;

    async fn find_version(&self, id: i64) -> Result<Option<ChecklistVersion>, DomainError>;

    async fn latest_version(&self) -> Result<Option<ChecklistVersion>, DomainError>;

    async fn list_versions(&self) -> Result<Vec<ChecklistVersion>, DomainError>;

    async fn version_items(&self, version_id: i64) -> Result<Vec<VersionItem>, DomainError>;

    async fn item_cycles(&self, version_id: i64) -> Result<Vec<ItemCycle>, DomainError>;

    async fn is_version_referenced(&self, version_id: i64) -> Result<bool, DomainError>;

    /// Fails with `ImmutableVersion` once a transfer request pins the
    /// version and with `Conflict` when the (version, item) pair exists.
    async fn add_version_item(&self, mapping: VersionItem) -> Result<VersionItem, DomainError>;

    /// Upserts one matrix cell under the same immutability guard.
    async fn upsert_item_cycle(&self, cell: ItemCycle) -> Result<ItemCycle, DomainError>;

    /// Removes the (version, item) mapping and its matrix cells under the
    /// same immutability guard. Fails with `NotFound` when unmapped.
    async fn remove_version_item(&self, version_id: i64, item_id: i64) -> Result<(), DomainError>;

    /// Deletes a version and its maps. Only unreferenced versions can go.
    async fn delete_version(&self, version_id: i64) -> Result<(), DomainError>;

    /// Creates `label` with copies of the source version's maps.
    async fn copy_version(
        &self,
        source_id: i64,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError>;
}

/// Transfer requests, their answers and their approval event log.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Pins the checklist version, which becomes immutable from here on.
    async fn create_request(
        &self,
        request: NewTransferRequest,
    ) -> Result<TransferRequest, DomainError>;

    async fn find_request(&self, id: Uuid) -> Result<Option<TransferRequest>, DomainError>;

    async fn list_requests_for_mold(
        &self,
        mold_id: Uuid,
    ) -> Result<Vec<TransferRequest>, DomainError>;

    async fn list_answers(&self, request_id: Uuid) -> Result<Vec<ChecklistAnswer>, DomainError>;

    /// Upserts by (request, item). Fails with `InvalidTransition` unless the
    /// state replayed from the approval log accepts answers.
    async fn upsert_answer(&self, answer: ChecklistAnswer)
        -> Result<ChecklistAnswer, DomainError>;

    /// Events ordered by step number.
    async fn list_events(&self, request_id: Uuid) -> Result<Vec<ApprovalEvent>, DomainError>;

    /// Appends `event` and writes `change` with the request row locked.
    /// Fails with `Conflict` unless `event.step_number` is exactly one past
    /// the current highest step, so concurrent appends never share a step.
    async fn append_event(
        &self,
        event: NewApprovalEvent,
        change: StateChange,
    ) -> Result<ApprovalEvent, DomainError>;
}

/// Append-only location log.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn append_log(&self, log: NewLocationLog) -> Result<LocationLog, DomainError>;

    /// Logs inside `window`, newest first, strictly after `after` in that
    /// order.
    async fn page_logs(
        &self,
        mold_id: Uuid,
        window: HistoryWindow,
        after: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<LocationLog>, DomainError>;

    async fn latest_with_status(
        &self,
        mold_id: Uuid,
        status: LocationStatus,
        since: DateTime<Utc>,
    ) -> Result<Option<LocationLog>, DomainError>;
}

/// Mold master data.
#[async_trait]
pub trait MoldStore: Send + Sync {
    /// Fails with `Conflict` when the code is taken.
    async fn create_mold(&self, mold: NewMold) -> Result<Mold, DomainError>;

    async fn find_mold(&self, id: Uuid) -> Result<Option<Mold>, DomainError>;

    /// Writes `mold` and appends `revision` in one transaction. Fails with
    /// `Conflict` when the stored row changed since `expected_updated_at`.
    async fn update_mold(
        &self,
        mold: Mold,
        expected_updated_at: DateTime<Utc>,
        revision: NewRevision,
    ) -> Result<(Mold, RevisionRecord), DomainError>;
}

/// Revision ledger.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Numbers and chains the revision under a per-entity lock.
    async fn append_revision(&self, revision: NewRevision)
        -> Result<RevisionRecord, DomainError>;

    /// Revisions ordered by revision number.
    async fn list_revisions(&self, entity: &EntityRef) -> Result<Vec<RevisionRecord>, DomainError>;
}

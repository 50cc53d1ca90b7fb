//! In-process store backed by a single mutex.
//!
//! Every trait method runs under one lock, which gives it the same
//! all-or-nothing behavior the PostgreSQL repositories get from a
//! transaction. Used by the service tests and by embedders that do not need
//! durability.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::pagination::Cursor;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ChecklistStore, LocationStore, MoldStore, RevisionStore, TransferStore};
use crate::error::DomainError;
use crate::models::{
    ApprovalEvent, ChecklistAnswer, ChecklistItem, ChecklistVersion, EntityRef, HistoryWindow,
    ItemCycle, LocationLog, LocationStatus, Mold, MoldStage, NewApprovalEvent, NewChecklistItem,
    NewLocationLog, NewMold, NewRevision, NewTransferRequest, RevisionRecord, StateChange,
    TransferRequest, TransferState, VersionItem, WorkflowOp,
};
use crate::services::revision::record_hash;
use crate::services::workflow::{permits, LifecycleProjection};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    items: BTreeMap<i64, ChecklistItem>,
    versions: BTreeMap<i64, ChecklistVersion>,
    version_items: Vec<VersionItem>,
    item_cycles: Vec<ItemCycle>,
    requests: HashMap<Uuid, TransferRequest>,
    answers: BTreeMap<(Uuid, i64), ChecklistAnswer>,
    events: Vec<ApprovalEvent>,
    logs: Vec<LocationLog>,
    molds: HashMap<Uuid, Mold>,
    revisions: Vec<RevisionRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn version_referenced(&self, version_id: i64) -> bool {
        self.requests
            .values()
            .any(|r| r.checklist_version_id == version_id)
    }

    fn guard_mutable(&self, version_id: i64) -> Result<(), DomainError> {
        if !self.versions.contains_key(&version_id) {
            return Err(DomainError::not_found("Checklist version", version_id));
        }
        if self.version_referenced(version_id) {
            return Err(DomainError::ImmutableVersion { version_id });
        }
        Ok(())
    }

    /// State of a request as its approval log replays.
    fn replayed_state(&self, request: &TransferRequest) -> Result<TransferState, DomainError> {
        let mut events: Vec<ApprovalEvent> = self
            .events
            .iter()
            .filter(|e| e.request_id == request.id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.step_number);
        Ok(LifecycleProjection::replay(&events, request.required_approvals)?.state)
    }

    fn insert_version(
        &mut self,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        if self.versions.values().any(|v| v.label == label) {
            return Err(DomainError::conflict("checklist_versions_label_key"));
        }
        let version = ChecklistVersion {
            id: self.next_id(),
            label: label.to_string(),
            created_by,
            created_at: Utc::now(),
        };
        self.versions.insert(version.id, version.clone());
        Ok(version)
    }

    fn append_revision(&mut self, revision: NewRevision) -> RevisionRecord {
        let last = self
            .revisions
            .iter()
            .filter(|r| r.entity == revision.entity)
            .max_by_key(|r| r.revision_number);
        let revision_number = last.map(|r| r.revision_number + 1).unwrap_or(1);
        let previous_hash = last.map(|r| r.record_hash.clone());
        let hash = record_hash(previous_hash.as_deref(), revision_number, &revision);

        let record = RevisionRecord {
            id: self.next_id(),
            entity: revision.entity,
            revision_number,
            actor_id: revision.actor_id,
            reason: revision.reason,
            changed_fields: revision.changed_fields,
            before: revision.before,
            after: revision.after,
            previous_hash,
            record_hash: hash,
            created_at: Utc::now(),
        };
        self.revisions.push(record.clone());
        record
    }
}

/// Store implementation holding all state in memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the cached state of a request without touching its event
    /// log. Lets tests simulate a cache that drifted from the log.
    #[cfg(test)]
    pub async fn overwrite_cached_state(&self, request_id: Uuid, state: TransferState) {
        let mut guard = self.state.lock().await;
        if let Some(request) = guard.requests.get_mut(&request_id) {
            request.state = state;
        }
    }

    /// Replaces the stored hash of a revision. Lets tests simulate tampering.
    #[cfg(test)]
    pub async fn tamper_revision_hash(&self, entity: &EntityRef, revision_number: i32, hash: &str) {
        let mut guard = self.state.lock().await;
        if let Some(record) = guard
            .revisions
            .iter_mut()
            .find(|r| &r.entity == entity && r.revision_number == revision_number)
        {
            record.record_hash = hash.to_string();
        }
    }
}

#[async_trait]
impl ChecklistStore for InMemoryStore {
    async fn create_item(&self, item: NewChecklistItem) -> Result<ChecklistItem, DomainError> {
        let mut state = self.state.lock().await;
        let item = ChecklistItem {
            id: state.next_id(),
            category: item.category,
            name: item.name,
            description: item.description,
            requires_photo: item.requires_photo,
            is_active: true,
            sort_order: item.sort_order,
            created_at: Utc::now(),
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_item(&self, id: i64) -> Result<Option<ChecklistItem>, DomainError> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn list_items(&self, active_only: bool) -> Result<Vec<ChecklistItem>, DomainError> {
        let state = self.state.lock().await;
        let mut items: Vec<ChecklistItem> = state
            .items
            .values()
            .filter(|i| !active_only || i.is_active)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            (a.category.as_str(), a.sort_order, a.id).cmp(&(b.category.as_str(), b.sort_order, b.id))
        });
        Ok(items)
    }

    async fn items_for_version(&self, version_id: i64) -> Result<Vec<ChecklistItem>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .version_items
            .iter()
            .filter(|m| m.version_id == version_id)
            .filter_map(|m| state.items.get(&m.item_id).cloned())
            .collect())
    }

    async fn set_item_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<Option<ChecklistItem>, DomainError> {
        let mut state = self.state.lock().await;
        Ok(state.items.get_mut(&id).map(|item| {
            item.is_active = active;
            item.clone()
        }))
    }

    async fn create_version(
        &self,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        self.state.lock().await.insert_version(label, created_by)
    }

    async fn find_version(&self, id: i64) -> Result<Option<ChecklistVersion>, DomainError> {
        Ok(self.state.lock().await.versions.get(&id).cloned())
    }

    async fn latest_version(&self) -> Result<Option<ChecklistVersion>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .versions
            .values()
            .max_by_key(|v| (v.created_at, v.id))
            .cloned())
    }

    async fn list_versions(&self) -> Result<Vec<ChecklistVersion>, DomainError> {
        let state = self.state.lock().await;
        let mut versions: Vec<ChecklistVersion> = state.versions.values().cloned().collect();
        versions.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(versions)
    }

    async fn version_items(&self, version_id: i64) -> Result<Vec<VersionItem>, DomainError> {
        let state = self.state.lock().await;
        let mut items: Vec<VersionItem> = state
            .version_items
            .iter()
            .filter(|m| m.version_id == version_id)
            .cloned()
            .collect();
        items.sort_by_key(|m| (m.sort_order, m.item_id));
        Ok(items)
    }

    async fn item_cycles(&self, version_id: i64) -> Result<Vec<ItemCycle>, DomainError> {
        let state = self.state.lock().await;
        let mut cells: Vec<ItemCycle> = state
            .item_cycles
            .iter()
            .filter(|c| c.version_id == version_id)
            .cloned()
            .collect();
        cells.sort_by_key(|c| (c.item_id, c.cycle.as_str()));
        Ok(cells)
    }

    async fn is_version_referenced(&self, version_id: i64) -> Result<bool, DomainError> {
        Ok(self.state.lock().await.version_referenced(version_id))
    }

    async fn add_version_item(&self, mapping: VersionItem) -> Result<VersionItem, DomainError> {
        let mut state = self.state.lock().await;
        state.guard_mutable(mapping.version_id)?;
        if !state.items.contains_key(&mapping.item_id) {
            return Err(DomainError::not_found("Checklist item", mapping.item_id));
        }
        if state
            .version_items
            .iter()
            .any(|m| m.version_id == mapping.version_id && m.item_id == mapping.item_id)
        {
            return Err(DomainError::conflict("version_items_pkey"));
        }
        state.version_items.push(mapping.clone());
        Ok(mapping)
    }

    async fn upsert_item_cycle(&self, cell: ItemCycle) -> Result<ItemCycle, DomainError> {
        let mut state = self.state.lock().await;
        state.guard_mutable(cell.version_id)?;
        match state.item_cycles.iter_mut().find(|c| {
            c.version_id == cell.version_id && c.item_id == cell.item_id && c.cycle == cell.cycle
        }) {
            Some(existing) => existing.enabled = cell.enabled,
            None => state.item_cycles.push(cell.clone()),
        }
        Ok(cell)
    }

    async fn remove_version_item(&self, version_id: i64, item_id: i64) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.guard_mutable(version_id)?;
        let before = state.version_items.len();
        state
            .version_items
            .retain(|m| !(m.version_id == version_id && m.item_id == item_id));
        if state.version_items.len() == before {
            return Err(DomainError::not_found(
                "Version item",
                format!("{}/{}", version_id, item_id),
            ));
        }
        state
            .item_cycles
            .retain(|c| !(c.version_id == version_id && c.item_id == item_id));
        Ok(())
    }

    async fn delete_version(&self, version_id: i64) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.guard_mutable(version_id)?;
        state.versions.remove(&version_id);
        state.version_items.retain(|m| m.version_id != version_id);
        state.item_cycles.retain(|c| c.version_id != version_id);
        Ok(())
    }

    async fn copy_version(
        &self,
        source_id: i64,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        let mut state = self.state.lock().await;
        if !state.versions.contains_key(&source_id) {
            return Err(DomainError::not_found("Checklist version", source_id));
        }
        let version = state.insert_version(label, created_by)?;

        let items: Vec<VersionItem> = state
            .version_items
            .iter()
            .filter(|m| m.version_id == source_id)
            .map(|m| VersionItem {
                version_id: version.id,
                ..m.clone()
            })
            .collect();
        let cells: Vec<ItemCycle> = state
            .item_cycles
            .iter()
            .filter(|c| c.version_id == source_id)
            .map(|c| ItemCycle {
                version_id: version.id,
                ..c.clone()
            })
            .collect();
        state.version_items.extend(items);
        state.item_cycles.extend(cells);
        Ok(version)
    }
}

#[async_trait]
impl TransferStore for InMemoryStore {
    async fn create_request(
        &self,
        request: NewTransferRequest,
    ) -> Result<TransferRequest, DomainError> {
        let mut state = self.state.lock().await;
        if !state.versions.contains_key(&request.checklist_version_id) {
            return Err(DomainError::not_found(
                "Checklist version",
                request.checklist_version_id,
            ));
        }
        if !state.molds.contains_key(&request.mold_id) {
            return Err(DomainError::not_found("Mold", request.mold_id));
        }
        let now = Utc::now();
        let request = TransferRequest {
            id: Uuid::new_v4(),
            mold_id: request.mold_id,
            cycle: request.cycle,
            checklist_version_id: request.checklist_version_id,
            state: TransferState::Draft,
            required_approvals: request.required_approvals,
            created_by: request.created_by,
            submitted_at: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        };
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<TransferRequest>, DomainError> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn list_requests_for_mold(
        &self,
        mold_id: Uuid,
    ) -> Result<Vec<TransferRequest>, DomainError> {
        let state = self.state.lock().await;
        let mut requests: Vec<TransferRequest> = state
            .requests
            .values()
            .filter(|r| r.mold_id == mold_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_answers(&self, request_id: Uuid) -> Result<Vec<ChecklistAnswer>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .answers
            .range((request_id, i64::MIN)..=(request_id, i64::MAX))
            .map(|(_, answer)| answer.clone())
            .collect())
    }

    async fn upsert_answer(
        &self,
        answer: ChecklistAnswer,
    ) -> Result<ChecklistAnswer, DomainError> {
        let mut state = self.state.lock().await;
        let request = state
            .requests
            .get(&answer.request_id)
            .ok_or_else(|| DomainError::not_found("Transfer request", answer.request_id))?;
        let current = state.replayed_state(request)?;
        if !permits(WorkflowOp::RecordAnswer, current) {
            return Err(DomainError::InvalidTransition {
                from: current,
                operation: WorkflowOp::RecordAnswer,
            });
        }
        state
            .answers
            .insert((answer.request_id, answer.item_id), answer.clone());
        Ok(answer)
    }

    async fn list_events(&self, request_id: Uuid) -> Result<Vec<ApprovalEvent>, DomainError> {
        let state = self.state.lock().await;
        let mut events: Vec<ApprovalEvent> = state
            .events
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.step_number);
        Ok(events)
    }

    async fn append_event(
        &self,
        event: NewApprovalEvent,
        change: StateChange,
    ) -> Result<ApprovalEvent, DomainError> {
        let mut state = self.state.lock().await;
        let mold_id = state
            .requests
            .get(&event.request_id)
            .map(|r| r.mold_id)
            .ok_or_else(|| DomainError::not_found("Transfer request", event.request_id))?;

        let last_step = state
            .events
            .iter()
            .filter(|e| e.request_id == event.request_id)
            .map(|e| e.step_number)
            .max()
            .unwrap_or(0);
        if event.step_number != last_step + 1 {
            return Err(DomainError::conflict("approval_events_request_step_key"));
        }
        if change.promotion.is_some() && !state.molds.contains_key(&mold_id) {
            return Err(DomainError::not_found("Mold", mold_id));
        }

        let appended = ApprovalEvent {
            id: state.next_id(),
            request_id: event.request_id,
            step_number: event.step_number,
            action: event.action,
            actor_id: event.actor_id,
            comment: event.comment,
            created_at: event.occurred_at,
        };
        state.events.push(appended.clone());

        if let Some(request) = state.requests.get_mut(&event.request_id) {
            request.state = change.state;
            request.submitted_at = change.submitted_at;
            request.decided_at = change.decided_at;
            request.updated_at = event.occurred_at;
        }

        if let Some(revision) = change.promotion {
            if let Some(mold) = state.molds.get_mut(&mold_id) {
                mold.stage = MoldStage::MassProduction;
                mold.updated_at = event.occurred_at;
            }
            state.append_revision(revision);
        }

        Ok(appended)
    }
}

#[async_trait]
impl LocationStore for InMemoryStore {
    async fn append_log(&self, log: NewLocationLog) -> Result<LocationLog, DomainError> {
        let mut state = self.state.lock().await;
        if !state.molds.contains_key(&log.mold_id) {
            return Err(DomainError::not_found("Mold", log.mold_id));
        }
        let log = LocationLog {
            id: state.next_id(),
            mold_id: log.mold_id,
            reporter_id: log.reporter_id,
            latitude: log.position.latitude,
            longitude: log.position.longitude,
            distance_m: log.distance_m,
            threshold_m: log.threshold_m,
            status: log.status,
            source: log.source,
            reported_at: log.reported_at,
            created_at: Utc::now(),
        };
        state.logs.push(log.clone());
        Ok(log)
    }

    async fn page_logs(
        &self,
        mold_id: Uuid,
        window: HistoryWindow,
        after: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<LocationLog>, DomainError> {
        let state = self.state.lock().await;
        let mut logs: Vec<LocationLog> = state
            .logs
            .iter()
            .filter(|l| l.mold_id == mold_id && window.contains(l.reported_at))
            .filter(|l| match after {
                Some(cursor) => (l.reported_at, l.id) < (cursor.timestamp, cursor.id),
                None => true,
            })
            .cloned()
            .collect();
        logs.sort_by(|a, b| (b.reported_at, b.id).cmp(&(a.reported_at, a.id)));
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }

    async fn latest_with_status(
        &self,
        mold_id: Uuid,
        status: LocationStatus,
        since: DateTime<Utc>,
    ) -> Result<Option<LocationLog>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.mold_id == mold_id && l.status == status && l.reported_at >= since)
            .max_by_key(|l| (l.reported_at, l.id))
            .cloned())
    }
}

#[async_trait]
impl MoldStore for InMemoryStore {
    async fn create_mold(&self, mold: NewMold) -> Result<Mold, DomainError> {
        let mut state = self.state.lock().await;
        if state.molds.values().any(|m| m.code == mold.code) {
            return Err(DomainError::conflict("molds_code_key"));
        }
        let now = Utc::now();
        let mold = Mold {
            id: Uuid::new_v4(),
            code: mold.code,
            name: mold.name,
            company_id: mold.company_id,
            stage: MoldStage::Development,
            reference_latitude: mold.reference.map(|c| c.latitude),
            reference_longitude: mold.reference.map(|c| c.longitude),
            drift_threshold_m: mold.drift_threshold_m,
            created_at: now,
            updated_at: now,
        };
        state.molds.insert(mold.id, mold.clone());
        Ok(mold)
    }

    async fn find_mold(&self, id: Uuid) -> Result<Option<Mold>, DomainError> {
        Ok(self.state.lock().await.molds.get(&id).cloned())
    }

    async fn update_mold(
        &self,
        mut mold: Mold,
        expected_updated_at: DateTime<Utc>,
        revision: NewRevision,
    ) -> Result<(Mold, RevisionRecord), DomainError> {
        let mut state = self.state.lock().await;
        let stored = state
            .molds
            .get(&mold.id)
            .ok_or_else(|| DomainError::not_found("Mold", mold.id))?;
        if stored.updated_at != expected_updated_at {
            return Err(DomainError::conflict("molds_updated_at"));
        }
        mold.updated_at = Utc::now();
        state.molds.insert(mold.id, mold.clone());
        let record = state.append_revision(revision);
        Ok((mold, record))
    }
}

#[async_trait]
impl RevisionStore for InMemoryStore {
    async fn append_revision(
        &self,
        revision: NewRevision,
    ) -> Result<RevisionRecord, DomainError> {
        Ok(self.state.lock().await.append_revision(revision))
    }

    async fn list_revisions(&self, entity: &EntityRef) -> Result<Vec<RevisionRecord>, DomainError> {
        let state = self.state.lock().await;
        let mut records: Vec<RevisionRecord> = state
            .revisions
            .iter()
            .filter(|r| &r.entity == entity)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.revision_number);
        Ok(records)
    }
}

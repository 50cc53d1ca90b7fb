//! Revision log for master data.
//!
//! Revisions carry only the fields that changed. Each record is hashed over
//! its canonical content and chained to the previous record of the same
//! entity, so a rewritten or deleted record breaks every hash after it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use shared::crypto::chain_hash;
use tracing::info;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{ChainReport, EntityRef, NewRevision, RevisionEntityType, RevisionRecord};
use crate::store::RevisionStore;

/// Old and new value of a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub before: JsonValue,
    pub after: JsonValue,
}

fn fields(snapshot: &JsonValue) -> Map<String, JsonValue> {
    snapshot.as_object().cloned().unwrap_or_default()
}

/// Field-by-field difference between two object snapshots.
///
/// A key present on one side only counts as changed, with `null` standing in
/// for the missing value.
pub fn diff(before: &JsonValue, after: &JsonValue) -> BTreeMap<String, FieldChange> {
    let before = fields(before);
    let after = fields(after);
    let mut changes = BTreeMap::new();

    for key in before.keys().chain(after.keys()) {
        let old = before.get(key).cloned().unwrap_or(JsonValue::Null);
        let new = after.get(key).cloned().unwrap_or(JsonValue::Null);
        if old != new {
            changes.insert(key.clone(), FieldChange { before: old, after: new });
        }
    }
    changes
}

/// Hash of a revision chained onto the entity's previous record hash.
pub fn record_hash(previous: Option<&str>, revision_number: i32, revision: &NewRevision) -> String {
    let payload = json!({
        "entity_type": revision.entity.entity_type,
        "entity_id": revision.entity.entity_id,
        "revision_number": revision_number,
        "actor_id": revision.actor_id,
        "reason": revision.reason,
        "changed_fields": revision.changed_fields,
        "before": revision.before,
        "after": revision.after,
    });
    chain_hash(previous, &payload.to_string())
}

/// Recomputes the chain of `records`, which must be ordered by revision
/// number.
pub fn verify_records(entity: &EntityRef, records: &[RevisionRecord]) -> ChainReport {
    let mut previous: Option<&RevisionRecord> = None;
    let mut first_broken = None;

    for record in records {
        let content = NewRevision {
            entity: record.entity.clone(),
            actor_id: record.actor_id,
            reason: record.reason.clone(),
            changed_fields: record.changed_fields.clone(),
            before: record.before.clone(),
            after: record.after.clone(),
        };
        let expected_previous = previous.map(|p| p.record_hash.as_str());
        let number_ok = previous.map_or(record.revision_number >= 1, |p| {
            record.revision_number > p.revision_number
        });
        let link_ok = record.previous_hash.as_deref() == expected_previous;
        let hash_ok = record.record_hash
            == record_hash(expected_previous, record.revision_number, &content);

        if !(number_ok && link_ok && hash_ok) {
            first_broken = Some(record.revision_number);
            break;
        }
        previous = Some(record);
    }

    ChainReport {
        entity: entity.clone(),
        revisions: records.len(),
        intact: first_broken.is_none(),
        first_broken,
    }
}

pub(crate) fn count_recorded(entity_type: RevisionEntityType) {
    metrics::counter!("revisions_recorded_total", "entity_type" => entity_type.as_str())
        .increment(1);
}

/// Append-only ledger of field-level changes.
#[derive(Clone)]
pub struct RevisionLog {
    store: Arc<dyn RevisionStore>,
}

impl RevisionLog {
    pub fn new(store: Arc<dyn RevisionStore>) -> Self {
        Self { store }
    }

    /// Builds the revision documenting `before -> after`, or `None` when no
    /// field differs.
    pub fn prepare(
        entity: EntityRef,
        actor_id: Uuid,
        reason: Option<String>,
        before: &JsonValue,
        after: &JsonValue,
    ) -> Option<NewRevision> {
        let changes = diff(before, after);
        if changes.is_empty() {
            return None;
        }

        let mut old = Map::new();
        let mut new = Map::new();
        for (field, change) in &changes {
            old.insert(field.clone(), change.before.clone());
            new.insert(field.clone(), change.after.clone());
        }

        Some(NewRevision {
            entity,
            actor_id,
            reason,
            changed_fields: changes.into_keys().collect(),
            before: JsonValue::Object(old),
            after: JsonValue::Object(new),
        })
    }

    /// Records a change made outside a store transaction of its own.
    ///
    /// Callers that mutate the entity in the same call should hand the
    /// prepared revision to their store instead, so both commit together.
    pub async fn record(
        &self,
        entity: EntityRef,
        actor_id: Uuid,
        reason: Option<String>,
        before: &JsonValue,
        after: &JsonValue,
    ) -> Result<Option<RevisionRecord>, DomainError> {
        let Some(revision) = Self::prepare(entity, actor_id, reason, before, after) else {
            return Ok(None);
        };
        let record = self.store.append_revision(revision).await?;
        count_recorded(record.entity.entity_type);
        info!(
            entity = %record.entity,
            revision = record.revision_number,
            fields = ?record.changed_fields,
            "Revision recorded"
        );
        Ok(Some(record))
    }

    pub async fn history(&self, entity: &EntityRef) -> Result<Vec<RevisionRecord>, DomainError> {
        self.store.list_revisions(entity).await
    }

    pub async fn verify_chain(&self, entity: &EntityRef) -> Result<ChainReport, DomainError> {
        let records = self.store.list_revisions(entity).await?;
        Ok(verify_records(entity, &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn log() -> (Arc<InMemoryStore>, RevisionLog) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), RevisionLog::new(store))
    }

    #[test]
    fn test_diff_reports_only_changed_fields() {
        let before = json!({"name": "Cover", "stage": "development", "code": "M-1"});
        let after = json!({"name": "Cover LH", "stage": "development", "code": "M-1"});

        let changes = diff(&before, &after);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes["name"].before, json!("Cover"));
        assert_eq!(changes["name"].after, json!("Cover LH"));
    }

    #[test]
    fn test_diff_includes_added_and_removed_keys() {
        let before = json!({"a": 1, "b": 2});
        let after = json!({"b": 2, "c": 3});

        let changes = diff(&before, &after);

        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(changes["a"].after, JsonValue::Null);
        assert_eq!(changes["c"].before, JsonValue::Null);
    }

    #[test]
    fn test_prepare_skips_no_op() {
        let snapshot = json!({"name": "Cover"});
        let entity = EntityRef::new(RevisionEntityType::Company, "c-1");
        assert!(RevisionLog::prepare(entity, Uuid::new_v4(), None, &snapshot, &snapshot).is_none());
    }

    #[test]
    fn test_prepare_sorts_changed_fields() {
        let entity = EntityRef::new(RevisionEntityType::Problem, 7);
        let revision = RevisionLog::prepare(
            entity,
            Uuid::new_v4(),
            Some("triage".into()),
            &json!({"status": "open", "owner": "a"}),
            &json!({"status": "closed", "owner": "b"}),
        )
        .unwrap();

        assert_eq!(revision.changed_fields, vec!["owner", "status"]);
        assert_eq!(revision.before, json!({"owner": "a", "status": "open"}));
        assert_eq!(revision.after, json!({"owner": "b", "status": "closed"}));
    }

    #[tokio::test]
    async fn test_revision_numbers_strictly_increase_per_entity() {
        let (_, log) = log();
        let actor = Uuid::new_v4();
        let first = EntityRef::new(RevisionEntityType::Company, "c-1");
        let second = EntityRef::new(RevisionEntityType::Company, "c-2");

        for i in 0..4 {
            log.record(
                first.clone(),
                actor,
                None,
                &json!({"n": i}),
                &json!({"n": i + 1}),
            )
            .await
            .unwrap();
        }
        log.record(second.clone(), actor, None, &json!({"n": 0}), &json!({"n": 1}))
            .await
            .unwrap();

        let numbers: Vec<i32> = log
            .history(&first)
            .await
            .unwrap()
            .iter()
            .map(|r| r.revision_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(log.history(&second).await.unwrap()[0].revision_number, 1);
    }

    #[tokio::test]
    async fn test_record_no_op_writes_nothing() {
        let (_, log) = log();
        let entity = EntityRef::new(RevisionEntityType::Company, "c-1");
        let snapshot = json!({"name": "Acme"});

        let recorded = log
            .record(entity.clone(), Uuid::new_v4(), None, &snapshot, &snapshot)
            .await
            .unwrap();

        assert!(recorded.is_none());
        assert!(log.history(&entity).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chain_links_records() {
        let (_, log) = log();
        let entity = EntityRef::new(RevisionEntityType::Problem, "p-9");
        let actor = Uuid::new_v4();

        let r1 = log
            .record(entity.clone(), actor, None, &json!({"s": "open"}), &json!({"s": "wip"}))
            .await
            .unwrap()
            .unwrap();
        let r2 = log
            .record(entity.clone(), actor, None, &json!({"s": "wip"}), &json!({"s": "done"}))
            .await
            .unwrap()
            .unwrap();

        assert!(r1.previous_hash.is_none());
        assert_eq!(r2.previous_hash.as_deref(), Some(r1.record_hash.as_str()));

        let report = log.verify_chain(&entity).await.unwrap();
        assert!(report.intact);
        assert_eq!(report.revisions, 2);
    }

    #[tokio::test]
    async fn test_verify_chain_detects_tampering() {
        let (store, log) = log();
        let entity = EntityRef::new(RevisionEntityType::Company, "c-5");
        let actor = Uuid::new_v4();
        for i in 0..3 {
            log.record(entity.clone(), actor, None, &json!({"v": i}), &json!({"v": i + 1}))
                .await
                .unwrap();
        }

        store.tamper_revision_hash(&entity, 2, "deadbeef").await;

        let report = log.verify_chain(&entity).await.unwrap();
        assert!(!report.intact);
        assert_eq!(report.first_broken, Some(2));
    }
}

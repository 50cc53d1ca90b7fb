//! Revision record entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{EntityRef, RevisionEntityType, RevisionRecord};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for revisioned entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "revision_entity_type", rename_all = "lowercase")]
pub enum RevisionEntityTypeDb {
    Company,
    Mold,
    Problem,
}

impl From<RevisionEntityTypeDb> for RevisionEntityType {
    fn from(kind: RevisionEntityTypeDb) -> Self {
        match kind {
            RevisionEntityTypeDb::Company => RevisionEntityType::Company,
            RevisionEntityTypeDb::Mold => RevisionEntityType::Mold,
            RevisionEntityTypeDb::Problem => RevisionEntityType::Problem,
        }
    }
}

impl From<RevisionEntityType> for RevisionEntityTypeDb {
    fn from(kind: RevisionEntityType) -> Self {
        match kind {
            RevisionEntityType::Company => RevisionEntityTypeDb::Company,
            RevisionEntityType::Mold => RevisionEntityTypeDb::Mold,
            RevisionEntityType::Problem => RevisionEntityTypeDb::Problem,
        }
    }
}

/// Database row mapping for the revisions table.
#[derive(Debug, Clone, FromRow)]
pub struct RevisionEntity {
    pub id: i64,
    pub entity_type: RevisionEntityTypeDb,
    pub entity_id: String,
    pub revision_number: i32,
    pub actor_id: Uuid,
    pub reason: Option<String>,
    pub changed_fields: Vec<String>,
    pub before_values: JsonValue,
    pub after_values: JsonValue,
    pub previous_hash: Option<String>,
    pub record_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<RevisionEntity> for RevisionRecord {
    fn from(entity: RevisionEntity) -> Self {
        Self {
            id: entity.id,
            entity: EntityRef::new(entity.entity_type.into(), entity.entity_id),
            revision_number: entity.revision_number,
            actor_id: entity.actor_id,
            reason: entity.reason,
            changed_fields: entity.changed_fields,
            before: entity.before_values,
            after: entity.after_values,
            previous_hash: entity.previous_hash,
            record_hash: entity.record_hash,
            created_at: entity.created_at,
        }
    }
}

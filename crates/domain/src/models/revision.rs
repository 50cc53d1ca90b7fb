//! Revision log models for master data (companies, molds, problems).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of master entity whose changes are revisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionEntityType {
    Company,
    Mold,
    Problem,
}

impl RevisionEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionEntityType::Company => "company",
            RevisionEntityType::Mold => "mold",
            RevisionEntityType::Problem => "problem",
        }
    }
}

impl FromStr for RevisionEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "company" => Ok(RevisionEntityType::Company),
            "mold" => Ok(RevisionEntityType::Mold),
            "problem" => Ok(RevisionEntityType::Problem),
            _ => Err(format!("Unknown entity type: {}", s)),
        }
    }
}

impl std::fmt::Display for RevisionEntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a revisioned entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: RevisionEntityType,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: RevisionEntityType, entity_id: impl ToString) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
        }
    }

    pub fn mold(id: Uuid) -> Self {
        Self::new(RevisionEntityType::Mold, id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// A numbered, hash-chained record of field-level changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRecord {
    pub id: i64,
    pub entity: EntityRef,
    pub revision_number: i32,
    pub actor_id: Uuid,
    pub reason: Option<String>,
    pub changed_fields: Vec<String>,
    /// Values of the changed fields before the change, keyed by field.
    pub before: JsonValue,
    /// Values of the changed fields after the change, keyed by field.
    pub after: JsonValue,
    pub previous_hash: Option<String>,
    pub record_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A revision ready to be numbered and chained by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRevision {
    pub entity: EntityRef,
    pub actor_id: Uuid,
    pub reason: Option<String>,
    pub changed_fields: Vec<String>,
    pub before: JsonValue,
    pub after: JsonValue,
}

/// Outcome of recomputing an entity's hash chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub entity: EntityRef,
    pub revisions: usize,
    pub intact: bool,
    /// First revision whose number, link or hash does not verify.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_broken: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("Mold".parse::<RevisionEntityType>(), Ok(RevisionEntityType::Mold));
        assert!("device".parse::<RevisionEntityType>().is_err());
    }

    #[test]
    fn test_entity_ref_display() {
        let entity = EntityRef::new(RevisionEntityType::Problem, 42);
        assert_eq!(entity.to_string(), "problem:42");
    }
}

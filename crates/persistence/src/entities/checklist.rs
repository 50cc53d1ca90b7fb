//! Checklist catalog and version entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{ChecklistItem, ChecklistVersion, InspectionCycle, ItemCycle, VersionItem};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for inspection cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "inspection_cycle", rename_all = "lowercase")]
pub enum InspectionCycleDb {
    Daily,
    Periodic,
}

impl From<InspectionCycleDb> for InspectionCycle {
    fn from(cycle: InspectionCycleDb) -> Self {
        match cycle {
            InspectionCycleDb::Daily => InspectionCycle::Daily,
            InspectionCycleDb::Periodic => InspectionCycle::Periodic,
        }
    }
}

impl From<InspectionCycle> for InspectionCycleDb {
    fn from(cycle: InspectionCycle) -> Self {
        match cycle {
            InspectionCycle::Daily => InspectionCycleDb::Daily,
            InspectionCycle::Periodic => InspectionCycleDb::Periodic,
        }
    }
}

/// Database row mapping for the checklist_items table.
#[derive(Debug, Clone, FromRow)]
pub struct ChecklistItemEntity {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_photo: bool,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ChecklistItemEntity> for ChecklistItem {
    fn from(entity: ChecklistItemEntity) -> Self {
        Self {
            id: entity.id,
            category: entity.category,
            name: entity.name,
            description: entity.description,
            requires_photo: entity.requires_photo,
            is_active: entity.is_active,
            sort_order: entity.sort_order,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the checklist_versions table.
#[derive(Debug, Clone, FromRow)]
pub struct ChecklistVersionEntity {
    pub id: i64,
    pub label: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ChecklistVersionEntity> for ChecklistVersion {
    fn from(entity: ChecklistVersionEntity) -> Self {
        Self {
            id: entity.id,
            label: entity.label,
            created_by: entity.created_by,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the version_items table.
#[derive(Debug, Clone, FromRow)]
pub struct VersionItemEntity {
    pub version_id: i64,
    pub item_id: i64,
    pub required: bool,
    pub sort_order: i32,
}

impl From<VersionItemEntity> for VersionItem {
    fn from(entity: VersionItemEntity) -> Self {
        Self {
            version_id: entity.version_id,
            item_id: entity.item_id,
            required: entity.required,
            sort_order: entity.sort_order,
        }
    }
}

/// Database row mapping for the item_cycles table.
#[derive(Debug, Clone, FromRow)]
pub struct ItemCycleEntity {
    pub version_id: i64,
    pub item_id: i64,
    pub cycle: InspectionCycleDb,
    pub enabled: bool,
}

impl From<ItemCycleEntity> for ItemCycle {
    fn from(entity: ItemCycleEntity) -> Self {
        Self {
            version_id: entity.version_id,
            item_id: entity.item_id,
            cycle: entity.cycle.into(),
            enabled: entity.enabled,
        }
    }
}

//! Checklist catalog and versioned checklist models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Inspection frequency bucket that decides which items apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionCycle {
    Daily,
    Periodic,
}

impl InspectionCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionCycle::Daily => "daily",
            InspectionCycle::Periodic => "periodic",
        }
    }
}

impl FromStr for InspectionCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(InspectionCycle::Daily),
            "periodic" => Ok(InspectionCycle::Periodic),
            _ => Err(format!("Unknown inspection cycle: {}", s)),
        }
    }
}

impl std::fmt::Display for InspectionCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Master checklist item. Never edited in place; retired with `is_active = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_photo: bool,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for a new catalog item.
#[derive(Debug, Clone)]
pub struct NewChecklistItem {
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_photo: bool,
    pub sort_order: i32,
}

/// A named checklist snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistVersion {
    pub id: i64,
    pub label: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Membership of a catalog item in a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionItem {
    pub version_id: i64,
    pub item_id: i64,
    pub required: bool,
    pub sort_order: i32,
}

/// One cell of the item/cycle applicability matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCycle {
    pub version_id: i64,
    pub item_id: i64,
    pub cycle: InspectionCycle,
    pub enabled: bool,
}

/// A version together with its maps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetail {
    #[serde(flatten)]
    pub version: ChecklistVersion,
    pub items: Vec<VersionItem>,
    pub cycles: Vec<ItemCycle>,
    /// True once any transfer request pins this version.
    pub locked: bool,
}

/// One entry of a materialized checklist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedItem {
    pub item_id: i64,
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_photo: bool,
    pub required: bool,
    pub sort_order: i32,
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChecklistItemRequest {
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub requires_photo: bool,

    #[serde(default)]
    pub sort_order: i32,
}

impl From<CreateChecklistItemRequest> for NewChecklistItem {
    fn from(req: CreateChecklistItemRequest) -> Self {
        Self {
            category: req.category.trim().to_string(),
            name: req.name.trim().to_string(),
            description: req.description,
            requires_photo: req.requires_photo,
            sort_order: req.sort_order,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    #[validate(
        length(min = 1, max = 50, message = "Label must be 1-50 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVersionItemRequest {
    pub item_id: i64,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCycleRequest {
    pub item_id: i64,
    pub cycle: InspectionCycle,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeQuery {
    pub cycle: InspectionCycle,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspection_cycle_parse() {
        assert_eq!("daily".parse::<InspectionCycle>(), Ok(InspectionCycle::Daily));
        assert_eq!("PERIODIC".parse::<InspectionCycle>(), Ok(InspectionCycle::Periodic));
        assert!("hourly".parse::<InspectionCycle>().is_err());
    }

    #[test]
    fn test_inspection_cycle_serde() {
        let json = serde_json::to_string(&InspectionCycle::Periodic).unwrap();
        assert_eq!(json, "\"periodic\"");
    }

    #[test]
    fn test_add_version_item_defaults_to_required() {
        let req: AddVersionItemRequest = serde_json::from_str(r#"{"itemId": 4}"#).unwrap();
        assert!(req.required);
        assert_eq!(req.sort_order, 0);
    }

    #[test]
    fn test_create_version_rejects_blank_label() {
        let req = CreateVersionRequest {
            label: "   ".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_item_request_trims_names() {
        let req: CreateChecklistItemRequest = serde_json::from_str(
            r#"{"category": " Cooling ", "name": " Water line leak check ", "requiresPhoto": true}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        let item: NewChecklistItem = req.into();
        assert_eq!(item.category, "Cooling");
        assert_eq!(item.name, "Water line leak check");
        assert!(item.requires_photo);
    }
}

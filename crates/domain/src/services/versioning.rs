//! Checklist catalog and version store service.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{
    ChecklistItem, ChecklistVersion, InspectionCycle, ItemCycle, MaterializedItem,
    NewChecklistItem, VersionDetail, VersionItem,
};
use crate::store::ChecklistStore;

/// Computes the checklist a version prescribes for `cycle`.
///
/// An item is included when it is mapped into the version, its matrix cell
/// for the cycle exists and is enabled, and the catalog item is still
/// active. Output is ordered by the mapping's sort order, then item id.
pub fn materialize(
    items: &[ChecklistItem],
    mappings: &[VersionItem],
    cells: &[ItemCycle],
    cycle: InspectionCycle,
) -> Vec<MaterializedItem> {
    let catalog: HashMap<i64, &ChecklistItem> = items.iter().map(|i| (i.id, i)).collect();
    let enabled: HashSet<i64> = cells
        .iter()
        .filter(|c| c.cycle == cycle && c.enabled)
        .map(|c| c.item_id)
        .collect();

    let mut selected: Vec<&VersionItem> = mappings
        .iter()
        .filter(|m| enabled.contains(&m.item_id))
        .filter(|m| catalog.get(&m.item_id).is_some_and(|i| i.is_active))
        .collect();
    selected.sort_by_key(|m| (m.sort_order, m.item_id));

    selected
        .into_iter()
        .filter_map(|m| {
            catalog.get(&m.item_id).map(|item| MaterializedItem {
                item_id: item.id,
                category: item.category.clone(),
                name: item.name.clone(),
                description: item.description.clone(),
                requires_photo: item.requires_photo,
                required: m.required,
                sort_order: m.sort_order,
            })
        })
        .collect()
}

fn not_blank(value: &str, field: &str) -> Result<(), DomainError> {
    shared::validation::validate_not_blank(value)
        .map_err(|_| DomainError::Validation(format!("{} cannot be blank", field)))
}

/// Catalog and version operations.
#[derive(Clone)]
pub struct ChecklistService {
    store: Arc<dyn ChecklistStore>,
}

impl ChecklistService {
    pub fn new(store: Arc<dyn ChecklistStore>) -> Self {
        Self { store }
    }

    pub async fn create_item(&self, item: NewChecklistItem) -> Result<ChecklistItem, DomainError> {
        not_blank(&item.category, "Category")?;
        not_blank(&item.name, "Name")?;
        let item = self.store.create_item(item).await?;
        info!(item_id = item.id, category = %item.category, "Checklist item created");
        Ok(item)
    }

    /// Retires an item. Versions keep their mapping but stop materializing it.
    pub async fn deactivate_item(&self, item_id: i64) -> Result<ChecklistItem, DomainError> {
        let item = self
            .store
            .set_item_active(item_id, false)
            .await?
            .ok_or_else(|| DomainError::not_found("Checklist item", item_id))?;
        info!(item_id, "Checklist item deactivated");
        Ok(item)
    }

    pub async fn list_items(&self, active_only: bool) -> Result<Vec<ChecklistItem>, DomainError> {
        self.store.list_items(active_only).await
    }

    pub async fn create_version(
        &self,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        let label = label.trim();
        not_blank(label, "Label")?;
        let version = self.store.create_version(label, created_by).await?;
        info!(version_id = version.id, label = %version.label, "Checklist version created");
        Ok(version)
    }

    pub async fn add_item_to_version(
        &self,
        version_id: i64,
        item_id: i64,
        required: bool,
        sort_order: i32,
    ) -> Result<VersionItem, DomainError> {
        let mapping = VersionItem {
            version_id,
            item_id,
            required,
            sort_order,
        };
        match self.store.add_version_item(mapping).await {
            Ok(mapping) => {
                info!(version_id, item_id, required, "Item added to checklist version");
                Ok(mapping)
            }
            Err(e) => {
                warn!(version_id, item_id, error = %e, "Item not added to checklist version");
                Err(e)
            }
        }
    }

    pub async fn set_cycle_applicability(
        &self,
        version_id: i64,
        item_id: i64,
        cycle: InspectionCycle,
        enabled: bool,
    ) -> Result<ItemCycle, DomainError> {
        if self.store.find_item(item_id).await?.is_none() {
            return Err(DomainError::not_found("Checklist item", item_id));
        }
        let cell = ItemCycle {
            version_id,
            item_id,
            cycle,
            enabled,
        };
        match self.store.upsert_item_cycle(cell).await {
            Ok(cell) => {
                info!(version_id, item_id, %cycle, enabled, "Cycle applicability set");
                Ok(cell)
            }
            Err(e) => {
                warn!(version_id, item_id, %cycle, error = %e, "Cycle applicability not set");
                Err(e)
            }
        }
    }

    pub async fn remove_item_from_version(
        &self,
        version_id: i64,
        item_id: i64,
    ) -> Result<(), DomainError> {
        match self.store.remove_version_item(version_id, item_id).await {
            Ok(()) => {
                info!(version_id, item_id, "Item removed from checklist version");
                Ok(())
            }
            Err(e) => {
                warn!(version_id, item_id, error = %e, "Item not removed from checklist version");
                Err(e)
            }
        }
    }

    /// Deletes an unreferenced version together with its maps.
    pub async fn delete_version(&self, version_id: i64) -> Result<(), DomainError> {
        match self.store.delete_version(version_id).await {
            Ok(()) => {
                info!(version_id, "Checklist version deleted");
                Ok(())
            }
            Err(e) => {
                warn!(version_id, error = %e, "Checklist version not deleted");
                Err(e)
            }
        }
    }

    /// Read-only and idempotent.
    pub async fn materialize(
        &self,
        version_id: i64,
        cycle: InspectionCycle,
    ) -> Result<Vec<MaterializedItem>, DomainError> {
        self.require_version(version_id).await?;
        let mappings = self.store.version_items(version_id).await?;
        let cells = self.store.item_cycles(version_id).await?;
        let items = self.store.items_for_version(version_id).await?;
        Ok(materialize(&items, &mappings, &cells, cycle))
    }

    pub async fn get_version(&self, version_id: i64) -> Result<VersionDetail, DomainError> {
        let version = self.require_version(version_id).await?;
        Ok(VersionDetail {
            items: self.store.version_items(version_id).await?,
            cycles: self.store.item_cycles(version_id).await?,
            locked: self.store.is_version_referenced(version_id).await?,
            version,
        })
    }

    pub async fn list_versions(&self) -> Result<Vec<ChecklistVersion>, DomainError> {
        self.store.list_versions().await
    }

    pub async fn latest_version(&self) -> Result<Option<ChecklistVersion>, DomainError> {
        self.store.latest_version().await
    }

    pub async fn find_version(&self, version_id: i64) -> Result<Option<ChecklistVersion>, DomainError> {
        self.store.find_version(version_id).await
    }

    pub async fn is_referenced(&self, version_id: i64) -> Result<bool, DomainError> {
        self.require_version(version_id).await?;
        self.store.is_version_referenced(version_id).await
    }

    /// Copies a version's maps into a new version that can still be edited.
    pub async fn derive_version(
        &self,
        source_id: i64,
        label: &str,
        created_by: Option<Uuid>,
    ) -> Result<ChecklistVersion, DomainError> {
        let label = label.trim();
        not_blank(label, "Label")?;
        let version = self.store.copy_version(source_id, label, created_by).await?;
        info!(
            source_id,
            version_id = version.id,
            label = %version.label,
            "Checklist version derived"
        );
        Ok(version)
    }

    async fn require_version(&self, version_id: i64) -> Result<ChecklistVersion, DomainError> {
        self.store
            .find_version(version_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Checklist version", version_id))
    }
}

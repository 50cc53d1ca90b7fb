//! Mold master data with revisioned updates.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::revision::{count_recorded, RevisionLog};
use crate::error::DomainError;
use crate::models::mold::UpdateMoldRequest;
use crate::models::{EntityRef, Mold, NewMold, RevisionRecord};
use crate::store::MoldStore;

/// Result of an update. `revision` is `None` when the patch changed nothing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoldUpdate {
    pub mold: Mold,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<RevisionRecord>,
}

fn validation(err: validator::ValidationError) -> DomainError {
    DomainError::Validation(
        err.message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string()),
    )
}

fn check_geometry(mold: &Mold) -> Result<(), DomainError> {
    if let Some(lat) = mold.reference_latitude {
        shared::validation::validate_latitude(lat).map_err(validation)?;
    }
    if let Some(lon) = mold.reference_longitude {
        shared::validation::validate_longitude(lon).map_err(validation)?;
    }
    if let Some(threshold) = mold.drift_threshold_m {
        shared::validation::validate_drift_threshold(threshold).map_err(validation)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct MoldService {
    store: Arc<dyn MoldStore>,
}

impl MoldService {
    pub fn new(store: Arc<dyn MoldStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, mold: NewMold) -> Result<Mold, DomainError> {
        shared::validation::validate_not_blank(&mold.code).map_err(validation)?;
        if let Some(reference) = mold.reference {
            shared::validation::validate_latitude(reference.latitude).map_err(validation)?;
            shared::validation::validate_longitude(reference.longitude).map_err(validation)?;
        }
        if let Some(threshold) = mold.drift_threshold_m {
            shared::validation::validate_drift_threshold(threshold).map_err(validation)?;
        }
        let mold = self.store.create_mold(mold).await?;
        info!(mold_id = %mold.id, code = %mold.code, "Mold created");
        Ok(mold)
    }

    pub async fn get(&self, mold_id: Uuid) -> Result<Mold, DomainError> {
        self.store
            .find_mold(mold_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Mold", mold_id))
    }

    /// Applies `patch` and records the revision in the same transaction.
    pub async fn update(
        &self,
        mold_id: Uuid,
        patch: &UpdateMoldRequest,
        actor_id: Uuid,
    ) -> Result<MoldUpdate, DomainError> {
        let current = self.get(mold_id).await?;
        let updated = patch.apply(&current).map_err(DomainError::Validation)?;
        check_geometry(&updated)?;

        let Some(revision) = RevisionLog::prepare(
            EntityRef::mold(mold_id),
            actor_id,
            patch.reason.clone(),
            &current.snapshot(),
            &updated.snapshot(),
        ) else {
            return Ok(MoldUpdate {
                mold: current,
                revision: None,
            });
        };

        let (mold, record) = self
            .store
            .update_mold(updated, current.updated_at, revision)
            .await?;
        count_recorded(record.entity.entity_type);
        info!(
            mold_id = %mold_id,
            revision = record.revision_number,
            fields = ?record.changed_fields,
            "Mold updated"
        );
        Ok(MoldUpdate {
            mold,
            revision: Some(record),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use crate::services::revision::RevisionLog;
    use crate::store::InMemoryStore;
    use fake::faker::company::en::CompanyName;
    use fake::Fake;

    async fn setup() -> (Arc<InMemoryStore>, MoldService, Mold) {
        let store = Arc::new(InMemoryStore::new());
        let service = MoldService::new(store.clone());
        let mold = service
            .create(NewMold {
                code: "MD-3300".into(),
                name: CompanyName().fake(),
                company_id: None,
                reference: Some(Coordinates::new(35.0, 129.0)),
                drift_threshold_m: None,
            })
            .await
            .unwrap();
        (store, service, mold)
    }

    #[tokio::test]
    async fn test_update_records_changed_fields() {
        let (store, service, mold) = setup().await;
        let actor = Uuid::new_v4();
        let patch = UpdateMoldRequest {
            name: Some("Tailgate garnish".into()),
            drift_threshold_m: Some(250.0),
            reason: Some("Relocated to line 3".into()),
            ..Default::default()
        };

        let result = service.update(mold.id, &patch, actor).await.unwrap();

        assert_eq!(result.mold.name, "Tailgate garnish");
        let revision = result.revision.unwrap();
        assert_eq!(revision.revision_number, 1);
        assert_eq!(revision.changed_fields, vec!["drift_threshold_m", "name"]);
        assert_eq!(revision.reason.as_deref(), Some("Relocated to line 3"));

        let history = RevisionLog::new(store)
            .history(&EntityRef::mold(mold.id))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_no_op_update_writes_nothing() {
        let (store, service, mold) = setup().await;
        let patch = UpdateMoldRequest {
            name: Some(mold.name.clone()),
            ..Default::default()
        };

        let result = service.update(mold.id, &patch, Uuid::new_v4()).await.unwrap();

        assert!(result.revision.is_none());
        assert_eq!(result.mold.updated_at, mold.updated_at);
        assert!(RevisionLog::new(store)
            .history(&EntityRef::mold(mold.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_half_reference() {
        let (_, service, mold) = setup().await;
        let patch = UpdateMoldRequest {
            reference_latitude: Some(36.0),
            ..Default::default()
        };

        let err = service
            .update(mold.id, &patch, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let (_, service, _) = setup().await;
        let err = service
            .create(NewMold {
                code: "MD-3300".into(),
                name: "Other".into(),
                company_id: None,
                reference: None,
                drift_threshold_m: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_sequential_updates_number_revisions() {
        let (store, service, mold) = setup().await;
        for threshold in [120.0, 140.0, 160.0] {
            let patch = UpdateMoldRequest {
                drift_threshold_m: Some(threshold),
                ..Default::default()
            };
            service.update(mold.id, &patch, Uuid::new_v4()).await.unwrap();
        }

        let log = RevisionLog::new(store);
        let numbers: Vec<i32> = log
            .history(&EntityRef::mold(mold.id))
            .await
            .unwrap()
            .iter()
            .map(|r| r.revision_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(log.verify_chain(&EntityRef::mold(mold.id)).await.unwrap().intact);
    }
}

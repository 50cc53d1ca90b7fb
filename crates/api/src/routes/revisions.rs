//! Revision history endpoint handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use domain::models::{ChainReport, EntityRef, RevisionEntityType, RevisionRecord};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionHistoryResponse {
    pub entity: EntityRef,
    pub revisions: Vec<RevisionRecord>,
}

fn entity_ref(entity_type: &str, entity_id: String) -> Result<EntityRef, ApiError> {
    let entity_type: RevisionEntityType = entity_type.parse().map_err(ApiError::Validation)?;
    Ok(EntityRef::new(entity_type, entity_id))
}

/// GET /api/v1/revisions/:entity_type/:entity_id
pub async fn history(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<RevisionHistoryResponse>, ApiError> {
    let entity = entity_ref(&entity_type, entity_id)?;
    let revisions = state.revisions.history(&entity).await?;
    Ok(Json(RevisionHistoryResponse { entity, revisions }))
}

/// Recomputes the hash chain of one entity's history.
///
/// GET /api/v1/revisions/:entity_type/:entity_id/verify
pub async fn verify_chain(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<ChainReport>, ApiError> {
    let entity = entity_ref(&entity_type, entity_id)?;
    Ok(Json(state.revisions.verify_chain(&entity).await?))
}

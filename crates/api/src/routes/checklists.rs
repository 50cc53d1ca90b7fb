//! Checklist catalog and version endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use domain::models::checklist::{
    AddVersionItemRequest, CreateChecklistItemRequest, CreateVersionRequest, ListItemsQuery,
    MaterializeQuery, SetCycleRequest,
};
use domain::models::{
    ChecklistItem, ChecklistVersion, InspectionCycle, ItemCycle, MaterializedItem, VersionDetail,
    VersionItem,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsResponse {
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVersionsResponse {
    pub versions: Vec<ChecklistVersion>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeResponse {
    pub version_id: i64,
    pub cycle: InspectionCycle,
    pub items: Vec<MaterializedItem>,
}

/// GET /api/v1/checklist/items?activeOnly=true
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<ListItemsResponse>, ApiError> {
    let items = state.checklists.list_items(query.active_only).await?;
    Ok(Json(ListItemsResponse { items }))
}

/// POST /api/v1/checklist/items
pub async fn create_item(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateChecklistItemRequest>,
) -> Result<(StatusCode, Json<ChecklistItem>), ApiError> {
    actor.require_admin()?;
    request.validate()?;
    let item = state.checklists.create_item(request.into()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Soft-deletes an item; it stays mapped but no longer materializes.
///
/// POST /api/v1/checklist/items/:item_id/deactivate
pub async fn deactivate_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(item_id): Path<i64>,
) -> Result<Json<ChecklistItem>, ApiError> {
    actor.require_admin()?;
    Ok(Json(state.checklists.deactivate_item(item_id).await?))
}

/// GET /api/v1/checklist/versions
pub async fn list_versions(
    State(state): State<AppState>,
) -> Result<Json<ListVersionsResponse>, ApiError> {
    let versions = state.checklists.list_versions().await?;
    Ok(Json(ListVersionsResponse { versions }))
}

/// POST /api/v1/checklist/versions
pub async fn create_version(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<ChecklistVersion>), ApiError> {
    actor.require_admin()?;
    request.validate()?;
    let version = state
        .checklists
        .create_version(&request.label, Some(actor.id))
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/v1/checklist/versions/latest
pub async fn latest_version(
    State(state): State<AppState>,
) -> Result<Json<ChecklistVersion>, ApiError> {
    state
        .checklists
        .latest_version()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No checklist version exists yet".into()))
}

/// GET /api/v1/checklist/versions/:version_id
pub async fn get_version(
    State(state): State<AppState>,
    Path(version_id): Path<i64>,
) -> Result<Json<VersionDetail>, ApiError> {
    Ok(Json(state.checklists.get_version(version_id).await?))
}

/// POST /api/v1/checklist/versions/:version_id/items
pub async fn add_version_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(version_id): Path<i64>,
    Json(request): Json<AddVersionItemRequest>,
) -> Result<(StatusCode, Json<VersionItem>), ApiError> {
    actor.require_admin()?;
    let mapping = state
        .checklists
        .add_item_to_version(
            version_id,
            request.item_id,
            request.required,
            request.sort_order,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// DELETE /api/v1/checklist/versions/:version_id/items/:item_id
pub async fn remove_version_item(
    State(state): State<AppState>,
    actor: Actor,
    Path((version_id, item_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    actor.require_admin()?;
    state
        .checklists
        .remove_item_from_version(version_id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Only versions no transfer request has pinned can be deleted.
///
/// DELETE /api/v1/checklist/versions/:version_id
pub async fn delete_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(version_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    actor.require_admin()?;
    state.checklists.delete_version(version_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/checklist/versions/:version_id/cycles
pub async fn set_cycle(
    State(state): State<AppState>,
    actor: Actor,
    Path(version_id): Path<i64>,
    Json(request): Json<SetCycleRequest>,
) -> Result<Json<ItemCycle>, ApiError> {
    actor.require_admin()?;
    let cell = state
        .checklists
        .set_cycle_applicability(version_id, request.item_id, request.cycle, request.enabled)
        .await?;
    Ok(Json(cell))
}

/// Copies a version's maps into a new editable version.
///
/// POST /api/v1/checklist/versions/:version_id/derive
pub async fn derive_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(version_id): Path<i64>,
    Json(request): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<ChecklistVersion>), ApiError> {
    actor.require_admin()?;
    request.validate()?;
    let version = state
        .checklists
        .derive_version(version_id, &request.label, Some(actor.id))
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/v1/checklist/versions/:version_id/materialize?cycle=daily
pub async fn materialize(
    State(state): State<AppState>,
    Path(version_id): Path<i64>,
    Query(query): Query<MaterializeQuery>,
) -> Result<Json<MaterializeResponse>, ApiError> {
    let items = state.checklists.materialize(version_id, query.cycle).await?;
    Ok(Json(MaterializeResponse {
        version_id,
        cycle: query.cycle,
        items,
    }))
}

//! Mold master data and location endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use domain::models::location_log::{LocationHistoryQuery, RecordScanRequest};
use domain::models::mold::{CreateMoldRequest, UpdateMoldRequest};
use domain::models::{Coordinates, LocationHistoryPage, LocationLog, Mold};
use domain::services::MoldUpdate;

/// POST /api/v1/molds
pub async fn create_mold(
    State(state): State<AppState>,
    _actor: Actor,
    Json(request): Json<CreateMoldRequest>,
) -> Result<(StatusCode, Json<Mold>), ApiError> {
    request.validate()?;
    let new_mold = request.into_new_mold().map_err(ApiError::Validation)?;
    let mold = state.molds.create(new_mold).await?;
    Ok((StatusCode::CREATED, Json(mold)))
}

/// GET /api/v1/molds/:mold_id
pub async fn get_mold(
    State(state): State<AppState>,
    Path(mold_id): Path<Uuid>,
) -> Result<Json<Mold>, ApiError> {
    Ok(Json(state.molds.get(mold_id).await?))
}

/// Applies a partial update and records its revision.
///
/// PATCH /api/v1/molds/:mold_id
pub async fn update_mold(
    State(state): State<AppState>,
    actor: Actor,
    Path(mold_id): Path<Uuid>,
    Json(request): Json<UpdateMoldRequest>,
) -> Result<Json<MoldUpdate>, ApiError> {
    request.validate()?;
    Ok(Json(state.molds.update(mold_id, &request, actor.id).await?))
}

/// POST /api/v1/molds/:mold_id/scans
pub async fn record_scan(
    State(state): State<AppState>,
    actor: Actor,
    Path(mold_id): Path<Uuid>,
    Json(request): Json<RecordScanRequest>,
) -> Result<(StatusCode, Json<LocationLog>), ApiError> {
    request.validate()?;
    let log = state
        .tracker
        .record_scan(
            mold_id,
            Coordinates::new(request.latitude, request.longitude),
            actor.id,
            request.source,
            request.reported_at,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// GET /api/v1/molds/:mold_id/locations?from=&to=&cursor=&limit=
pub async fn location_history(
    State(state): State<AppState>,
    Path(mold_id): Path<Uuid>,
    Query(query): Query<LocationHistoryQuery>,
) -> Result<Json<LocationHistoryPage>, ApiError> {
    Ok(Json(state.tracker.page(mold_id, &query).await?))
}

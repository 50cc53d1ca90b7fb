//! Transfer request endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use domain::models::transfer::{
    AdvanceApprovalRequest, CancelTransferRequest, CreateTransferRequest, RecordAnswerRequest,
    TransitionCommentRequest,
};
use domain::models::{ChecklistAnswer, ConsistencyReport, TransferRequest, TransferView};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransfersResponse {
    pub requests: Vec<TransferRequest>,
}

/// Comment body is optional for submit and reopen.
fn optional_comment(body: Option<Json<TransitionCommentRequest>>) -> Result<Option<String>, ApiError> {
    let Some(Json(body)) = body else {
        return Ok(None);
    };
    body.validate()?;
    Ok(body.comment)
}

/// Opens a draft request with its checklist version pinned.
///
/// POST /api/v1/transfers
pub async fn create_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<TransferRequest>), ApiError> {
    let created = state
        .workflow
        .create_request(
            request.mold_id,
            request.cycle,
            request.checklist_version_id,
            actor.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/transfers/:request_id
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<TransferView>, ApiError> {
    Ok(Json(state.workflow.get(request_id).await?))
}

/// GET /api/v1/molds/:mold_id/transfers
pub async fn list_for_mold(
    State(state): State<AppState>,
    Path(mold_id): Path<Uuid>,
) -> Result<Json<ListTransfersResponse>, ApiError> {
    let requests = state.workflow.list_for_mold(mold_id).await?;
    Ok(Json(ListTransfersResponse { requests }))
}

/// PUT /api/v1/transfers/:request_id/answers/:item_id
pub async fn record_answer(
    State(state): State<AppState>,
    actor: Actor,
    Path((request_id, item_id)): Path<(Uuid, i64)>,
    Json(request): Json<RecordAnswerRequest>,
) -> Result<Json<ChecklistAnswer>, ApiError> {
    request.validate()?;
    let answer = state
        .workflow
        .record_answer(
            request_id,
            item_id,
            request.result,
            request.remark,
            request.attachment_ref,
            actor.id,
        )
        .await?;
    Ok(Json(answer))
}

/// POST /api/v1/transfers/:request_id/submit
pub async fn submit(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<Uuid>,
    body: Option<Json<TransitionCommentRequest>>,
) -> Result<Json<TransferView>, ApiError> {
    let comment = optional_comment(body)?;
    Ok(Json(state.workflow.submit(request_id, actor.id, comment).await?))
}

/// Records one approval step decision.
///
/// POST /api/v1/transfers/:request_id/approvals
pub async fn advance_approval(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<Uuid>,
    Json(request): Json<AdvanceApprovalRequest>,
) -> Result<Json<TransferView>, ApiError> {
    request.validate()?;
    let view = state
        .workflow
        .advance_approval(request_id, actor.id, request.decision, request.comment)
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/transfers/:request_id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<Uuid>,
    Json(request): Json<CancelTransferRequest>,
) -> Result<Json<TransferView>, ApiError> {
    request.validate()?;
    let view = state
        .workflow
        .cancel(request_id, actor.id, request.reason)
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/transfers/:request_id/reopen
pub async fn reopen(
    State(state): State<AppState>,
    actor: Actor,
    Path(request_id): Path<Uuid>,
    body: Option<Json<TransitionCommentRequest>>,
) -> Result<Json<TransferView>, ApiError> {
    let comment = optional_comment(body)?;
    Ok(Json(state.workflow.reopen(request_id, actor.id, comment).await?))
}

/// Replays the approval log against the cached state.
///
/// GET /api/v1/transfers/:request_id/verify
pub async fn verify(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ConsistencyReport>, ApiError> {
    Ok(Json(state.workflow.verify(request_id).await?))
}

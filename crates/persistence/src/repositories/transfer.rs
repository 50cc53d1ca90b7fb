//! Transfer request repository.
//!
//! Every write to a request locks its row `FOR UPDATE` first. Event appends
//! additionally rely on the unique `(request_id, step_number)` constraint,
//! and answer writes are guarded by the state the locked log replays to.

use async_trait::async_trait;
use domain::models::{
    ApprovalEvent, ChecklistAnswer, MoldStage, NewApprovalEvent, NewTransferRequest, StateChange,
    TransferRequest, TransferState, WorkflowOp,
};
use domain::services::workflow::{permits, LifecycleProjection};
use domain::store::TransferStore;
use domain::DomainError;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::revision::append_revision_tx;
use crate::entities::{
    ApprovalActionDb, ApprovalEventEntity, ChecklistAnswerEntity, CheckResultDb, InspectionCycleDb,
    MoldStageDb, TransferRequestEntity, TransferStateDb,
};
use crate::metrics::QueryTimer;

async fn lock_request(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> Result<TransferRequestEntity, DomainError> {
    sqlx::query_as::<_, TransferRequestEntity>(
        "SELECT * FROM transfer_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DomainError::not_found("Transfer request", request_id))
}

/// Replays the request's approval log. Call with the request row locked so
/// no event lands between the replay and the write it guards.
async fn replayed_state(
    conn: &mut PgConnection,
    request: &TransferRequestEntity,
) -> Result<TransferState, DomainError> {
    let events: Vec<ApprovalEvent> = sqlx::query_as::<_, ApprovalEventEntity>(
        "SELECT * FROM approval_events WHERE request_id = $1 ORDER BY step_number",
    )
    .bind(request.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Into::into)
    .collect();
    Ok(LifecycleProjection::replay(&events, request.required_approvals)?.state)
}

/// Repository for transfer requests, answers and approval events.
#[derive(Clone)]
pub struct TransferRepository {
    pool: PgPool,
}

impl TransferRepository {
    /// Creates a new TransferRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransferStore for TransferRepository {
    async fn create_request(
        &self,
        request: NewTransferRequest,
    ) -> Result<TransferRequest, DomainError> {
        let timer = QueryTimer::new("create_transfer_request");
        let mut tx = self.pool.begin().await?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT id FROM checklist_versions WHERE id = $1 FOR SHARE")
                .bind(request.checklist_version_id)
                .fetch_optional(&mut *tx)
                .await?;
        if version.is_none() {
            return Err(DomainError::not_found(
                "Checklist version",
                request.checklist_version_id,
            ));
        }

        let created = sqlx::query_as::<_, TransferRequestEntity>(
            r#"
            INSERT INTO transfer_requests (
                mold_id, cycle, checklist_version_id, state, required_approvals, created_by
            )
            VALUES ($1, $2, $3, 'draft', $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.mold_id)
        .bind(InspectionCycleDb::from(request.cycle))
        .bind(request.checklist_version_id)
        .bind(request.required_approvals)
        .bind(request.created_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(created.into())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<TransferRequest>, DomainError> {
        let timer = QueryTimer::new("find_transfer_request");
        let result = sqlx::query_as::<_, TransferRequestEntity>(
            "SELECT * FROM transfer_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        Ok(result?.map(Into::into))
    }

    async fn list_requests_for_mold(
        &self,
        mold_id: Uuid,
    ) -> Result<Vec<TransferRequest>, DomainError> {
        let timer = QueryTimer::new("list_transfer_requests_for_mold");
        let result = sqlx::query_as::<_, TransferRequestEntity>(
            "SELECT * FROM transfer_requests WHERE mold_id = $1 ORDER BY created_at DESC",
        )
        .bind(mold_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn list_answers(&self, request_id: Uuid) -> Result<Vec<ChecklistAnswer>, DomainError> {
        let timer = QueryTimer::new("list_transfer_answers");
        let result = sqlx::query_as::<_, ChecklistAnswerEntity>(
            "SELECT * FROM transfer_answers WHERE request_id = $1 ORDER BY item_id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn upsert_answer(
        &self,
        answer: ChecklistAnswer,
    ) -> Result<ChecklistAnswer, DomainError> {
        let timer = QueryTimer::new("upsert_transfer_answer");
        let mut tx = self.pool.begin().await?;

        let request = lock_request(&mut *tx, answer.request_id).await?;
        let state = replayed_state(&mut *tx, &request).await?;
        if !permits(WorkflowOp::RecordAnswer, state) {
            return Err(DomainError::InvalidTransition {
                from: state,
                operation: WorkflowOp::RecordAnswer,
            });
        }

        let stored = sqlx::query_as::<_, ChecklistAnswerEntity>(
            r#"
            INSERT INTO transfer_answers (
                request_id, item_id, checked, result, remark, attachment_ref,
                recorded_by, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (request_id, item_id) DO UPDATE SET
                checked = EXCLUDED.checked,
                result = EXCLUDED.result,
                remark = EXCLUDED.remark,
                attachment_ref = EXCLUDED.attachment_ref,
                recorded_by = EXCLUDED.recorded_by,
                recorded_at = EXCLUDED.recorded_at
            RETURNING *
            "#,
        )
        .bind(answer.request_id)
        .bind(answer.item_id)
        .bind(answer.checked)
        .bind(answer.result.map(CheckResultDb::from))
        .bind(&answer.remark)
        .bind(&answer.attachment_ref)
        .bind(answer.recorded_by)
        .bind(answer.recorded_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(stored.into())
    }

    async fn list_events(&self, request_id: Uuid) -> Result<Vec<ApprovalEvent>, DomainError> {
        let timer = QueryTimer::new("list_approval_events");
        let result = sqlx::query_as::<_, ApprovalEventEntity>(
            "SELECT * FROM approval_events WHERE request_id = $1 ORDER BY step_number",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result?.into_iter().map(Into::into).collect())
    }

    async fn append_event(
        &self,
        event: NewApprovalEvent,
        change: StateChange,
    ) -> Result<ApprovalEvent, DomainError> {
        let timer = QueryTimer::new("append_approval_event");
        let mut tx = self.pool.begin().await?;

        let request = lock_request(&mut *tx, event.request_id).await?;
        let last_step: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(step_number), 0) FROM approval_events WHERE request_id = $1",
        )
        .bind(event.request_id)
        .fetch_one(&mut *tx)
        .await?;
        if event.step_number != last_step + 1 {
            debug!(
                request_id = %event.request_id,
                step = event.step_number,
                last_step,
                "Approval step already taken"
            );
            return Err(DomainError::conflict("approval_events_request_step_key"));
        }

        let appended = sqlx::query_as::<_, ApprovalEventEntity>(
            r#"
            INSERT INTO approval_events (request_id, step_number, action, actor_id, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(event.request_id)
        .bind(event.step_number)
        .bind(ApprovalActionDb::from(event.action))
        .bind(event.actor_id)
        .bind(&event.comment)
        .bind(event.occurred_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE transfer_requests
            SET state = $2, submitted_at = $3, decided_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(event.request_id)
        .bind(TransferStateDb::from(change.state))
        .bind(change.submitted_at)
        .bind(change.decided_at)
        .bind(event.occurred_at)
        .execute(&mut *tx)
        .await?;

        if let Some(revision) = change.promotion {
            let promoted = sqlx::query(
                "UPDATE molds SET stage = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(request.mold_id)
            .bind(MoldStageDb::from(MoldStage::MassProduction))
            .execute(&mut *tx)
            .await?;
            if promoted.rows_affected() == 0 {
                return Err(DomainError::not_found("Mold", request.mold_id));
            }
            append_revision_tx(&mut *tx, revision).await?;
            info!(mold_id = %request.mold_id, "Mold promoted to mass production");
        }

        tx.commit().await?;
        timer.record();
        Ok(appended.into())
    }
}

//! Transfer request, answer and approval event entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{
    ApprovalAction, ApprovalEvent, CheckResult, ChecklistAnswer, TransferRequest, TransferState,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::checklist::InspectionCycleDb;

/// Database enum for transfer request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "transfer_state", rename_all = "snake_case")]
pub enum TransferStateDb {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Cancelled,
}

impl From<TransferStateDb> for TransferState {
    fn from(state: TransferStateDb) -> Self {
        match state {
            TransferStateDb::Draft => TransferState::Draft,
            TransferStateDb::Submitted => TransferState::Submitted,
            TransferStateDb::UnderReview => TransferState::UnderReview,
            TransferStateDb::Approved => TransferState::Approved,
            TransferStateDb::Rejected => TransferState::Rejected,
            TransferStateDb::Cancelled => TransferState::Cancelled,
        }
    }
}

impl From<TransferState> for TransferStateDb {
    fn from(state: TransferState) -> Self {
        match state {
            TransferState::Draft => TransferStateDb::Draft,
            TransferState::Submitted => TransferStateDb::Submitted,
            TransferState::UnderReview => TransferStateDb::UnderReview,
            TransferState::Approved => TransferStateDb::Approved,
            TransferState::Rejected => TransferStateDb::Rejected,
            TransferState::Cancelled => TransferStateDb::Cancelled,
        }
    }
}

/// Database enum for approval event actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "approval_action", rename_all = "lowercase")]
pub enum ApprovalActionDb {
    Submit,
    Approve,
    Reject,
    Cancel,
}

impl From<ApprovalActionDb> for ApprovalAction {
    fn from(action: ApprovalActionDb) -> Self {
        match action {
            ApprovalActionDb::Submit => ApprovalAction::Submit,
            ApprovalActionDb::Approve => ApprovalAction::Approve,
            ApprovalActionDb::Reject => ApprovalAction::Reject,
            ApprovalActionDb::Cancel => ApprovalAction::Cancel,
        }
    }
}

impl From<ApprovalAction> for ApprovalActionDb {
    fn from(action: ApprovalAction) -> Self {
        match action {
            ApprovalAction::Submit => ApprovalActionDb::Submit,
            ApprovalAction::Approve => ApprovalActionDb::Approve,
            ApprovalAction::Reject => ApprovalActionDb::Reject,
            ApprovalAction::Cancel => ApprovalActionDb::Cancel,
        }
    }
}

/// Database enum for checklist answer results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "check_result", rename_all = "snake_case")]
pub enum CheckResultDb {
    Pass,
    Fail,
    NotApplicable,
}

impl From<CheckResultDb> for CheckResult {
    fn from(result: CheckResultDb) -> Self {
        match result {
            CheckResultDb::Pass => CheckResult::Pass,
            CheckResultDb::Fail => CheckResult::Fail,
            CheckResultDb::NotApplicable => CheckResult::NotApplicable,
        }
    }
}

impl From<CheckResult> for CheckResultDb {
    fn from(result: CheckResult) -> Self {
        match result {
            CheckResult::Pass => CheckResultDb::Pass,
            CheckResult::Fail => CheckResultDb::Fail,
            CheckResult::NotApplicable => CheckResultDb::NotApplicable,
        }
    }
}

/// Database row mapping for the transfer_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct TransferRequestEntity {
    pub id: Uuid,
    pub mold_id: Uuid,
    pub cycle: InspectionCycleDb,
    pub checklist_version_id: i64,
    pub state: TransferStateDb,
    pub required_approvals: i32,
    pub created_by: Uuid,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransferRequestEntity> for TransferRequest {
    fn from(entity: TransferRequestEntity) -> Self {
        Self {
            id: entity.id,
            mold_id: entity.mold_id,
            cycle: entity.cycle.into(),
            checklist_version_id: entity.checklist_version_id,
            state: entity.state.into(),
            required_approvals: entity.required_approvals,
            created_by: entity.created_by,
            submitted_at: entity.submitted_at,
            decided_at: entity.decided_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the transfer_answers table.
#[derive(Debug, Clone, FromRow)]
pub struct ChecklistAnswerEntity {
    pub request_id: Uuid,
    pub item_id: i64,
    pub checked: bool,
    pub result: Option<CheckResultDb>,
    pub remark: Option<String>,
    pub attachment_ref: Option<String>,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl From<ChecklistAnswerEntity> for ChecklistAnswer {
    fn from(entity: ChecklistAnswerEntity) -> Self {
        Self {
            request_id: entity.request_id,
            item_id: entity.item_id,
            checked: entity.checked,
            result: entity.result.map(Into::into),
            remark: entity.remark,
            attachment_ref: entity.attachment_ref,
            recorded_by: entity.recorded_by,
            recorded_at: entity.recorded_at,
        }
    }
}

/// Database row mapping for the approval_events table.
#[derive(Debug, Clone, FromRow)]
pub struct ApprovalEventEntity {
    pub id: i64,
    pub request_id: Uuid,
    pub step_number: i32,
    pub action: ApprovalActionDb,
    pub actor_id: Uuid,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ApprovalEventEntity> for ApprovalEvent {
    fn from(entity: ApprovalEventEntity) -> Self {
        Self {
            id: entity.id,
            request_id: entity.request_id,
            step_number: entity.step_number,
            action: entity.action.into(),
            actor_id: entity.actor_id,
            comment: entity.comment,
            created_at: entity.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping_is_bijective() {
        for state in [
            TransferState::Draft,
            TransferState::Submitted,
            TransferState::UnderReview,
            TransferState::Approved,
            TransferState::Rejected,
            TransferState::Cancelled,
        ] {
            assert_eq!(TransferState::from(TransferStateDb::from(state)), state);
        }
    }
}

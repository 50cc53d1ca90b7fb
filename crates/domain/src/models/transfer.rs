//! Transfer request, checklist answer and approval event models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::checklist::InspectionCycle;

/// Lifecycle state of a transfer request.
///
/// The value stored on a request is a cache; the authority is the ordered
/// approval event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Cancelled,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Draft => "draft",
            TransferState::Submitted => "submitted",
            TransferState::UnderReview => "under_review",
            TransferState::Approved => "approved",
            TransferState::Rejected => "rejected",
            TransferState::Cancelled => "cancelled",
        }
    }

    /// Approved, rejected and cancelled end a review round. Only a rejected
    /// request can be reopened.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Approved | TransferState::Rejected | TransferState::Cancelled
        )
    }

    /// Answers may change only while nobody is reviewing them.
    pub fn accepts_answers(&self) -> bool {
        matches!(self, TransferState::Draft | TransferState::Rejected)
    }
}

impl FromStr for TransferState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TransferState::Draft),
            "submitted" => Ok(TransferState::Submitted),
            "under_review" => Ok(TransferState::UnderReview),
            "approved" => Ok(TransferState::Approved),
            "rejected" => Ok(TransferState::Rejected),
            "cancelled" => Ok(TransferState::Cancelled),
            _ => Err(format!("Unknown transfer state: {}", s)),
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recorded in the approval event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Submit,
    Approve,
    Reject,
    Cancel,
}

impl ApprovalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Submit => "submit",
            ApprovalAction::Approve => "approve",
            ApprovalAction::Reject => "reject",
            ApprovalAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer decision for one approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for ApprovalAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => ApprovalAction::Approve,
            Decision::Reject => ApprovalAction::Reject,
        }
    }
}

/// Caller-facing workflow operation. Submit and reopen both append a
/// `submit` event but are guarded differently, so errors name the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowOp {
    Submit,
    Approve,
    Reject,
    Cancel,
    Reopen,
    RecordAnswer,
}

impl WorkflowOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowOp::Submit => "submit",
            WorkflowOp::Approve => "approve",
            WorkflowOp::Reject => "reject",
            WorkflowOp::Cancel => "cancel",
            WorkflowOp::Reopen => "reopen",
            WorkflowOp::RecordAnswer => "record_answer",
        }
    }
}

impl std::fmt::Display for WorkflowOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one checklist item inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    Pass,
    Fail,
    NotApplicable,
}

/// A transfer request gating a mold's move to mass production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub id: Uuid,
    pub mold_id: Uuid,
    pub cycle: InspectionCycle,
    pub checklist_version_id: i64,
    pub state: TransferState,
    /// Approval steps needed for one review round, frozen at creation.
    pub required_approvals: i32,
    pub created_by: Uuid,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransferRequest {
    pub mold_id: Uuid,
    pub cycle: InspectionCycle,
    pub checklist_version_id: i64,
    pub required_approvals: i32,
    pub created_by: Uuid,
}

/// Recorded answer for one checklist item of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistAnswer {
    pub request_id: Uuid,
    pub item_id: i64,
    pub checked: bool,
    pub result: Option<CheckResult>,
    pub remark: Option<String>,
    pub attachment_ref: Option<String>,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

/// One entry of the append-only approval log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEvent {
    pub id: i64,
    pub request_id: Uuid,
    pub step_number: i32,
    pub action: ApprovalAction,
    pub actor_id: Uuid,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApprovalEvent {
    pub request_id: Uuid,
    pub step_number: i32,
    pub action: ApprovalAction,
    pub actor_id: Uuid,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Request projection written together with an appended event.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub state: TransferState,
    pub submitted_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Set when the request reaches `approved`: the mold is promoted to mass
    /// production and the revision documenting it is written atomically.
    pub promotion: Option<super::revision::NewRevision>,
}

/// Request, answers and full ordered event history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    pub request: TransferRequest,
    pub answers: Vec<ChecklistAnswer>,
    pub events: Vec<ApprovalEvent>,
}

/// Result of replaying a request's event log against its cached state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub request_id: Uuid,
    pub cached: TransferState,
    pub replayed: TransferState,
    pub consistent: bool,
    pub events: usize,
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub mold_id: Uuid,
    pub cycle: InspectionCycle,
    /// Defaults to the latest checklist version.
    pub checklist_version_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordAnswerRequest {
    pub result: CheckResult,

    #[validate(length(max = 2000, message = "Remark must be at most 2000 characters"))]
    pub remark: Option<String>,

    #[validate(length(max = 500, message = "Attachment reference must be at most 500 characters"))]
    pub attachment_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCommentRequest {
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceApprovalRequest {
    pub decision: Decision,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransferRequest {
    #[validate(length(min = 1, max = 2000, message = "Reason must be 1-2000 characters"))]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_state_round_trip_strings() {
        for state in [
            TransferState::Draft,
            TransferState::Submitted,
            TransferState::UnderReview,
            TransferState::Approved,
            TransferState::Rejected,
            TransferState::Cancelled,
        ] {
            assert_eq!(state.as_str().parse::<TransferState>(), Ok(state));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(TransferState::Approved.is_terminal());
        assert!(TransferState::Rejected.is_terminal());
        assert!(TransferState::Cancelled.is_terminal());
        assert!(!TransferState::Draft.is_terminal());
        assert!(!TransferState::UnderReview.is_terminal());
    }

    #[test]
    fn test_decision_maps_to_action() {
        assert_eq!(ApprovalAction::from(Decision::Approve), ApprovalAction::Approve);
        assert_eq!(ApprovalAction::from(Decision::Reject), ApprovalAction::Reject);
    }

    #[test]
    fn test_check_result_serde() {
        let result: CheckResult = serde_json::from_str("\"not_applicable\"").unwrap();
        assert_eq!(result, CheckResult::NotApplicable);
    }

    #[test]
    fn test_advance_request_deserialize() {
        let req: AdvanceApprovalRequest =
            serde_json::from_str(r#"{"decision":"reject","comment":"Gate worn"}"#).unwrap();
        assert_eq!(req.decision, Decision::Reject);
        assert_eq!(req.comment.as_deref(), Some("Gate worn"));
    }

    #[test]
    fn test_cancel_requires_reason() {
        let req = CancelTransferRequest {
            reason: String::new(),
        };
        assert!(req.validate().is_err());
    }
}

//! Transfer approval workflow.
//!
//! A request's lifecycle state is the fold of its approval event log. The
//! `state` column is a cache written together with each appended event and
//! checked by [`WorkflowEngine::verify`]. Guards are always evaluated against
//! the replayed state, never against the cache.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::location::LocationTracker;
use super::revision::{count_recorded, RevisionLog};
use super::versioning::ChecklistService;
use crate::error::DomainError;
use crate::models::{
    ApprovalAction, ApprovalEvent, ChecklistAnswer, ConsistencyReport, Decision, EntityRef,
    InspectionCycle, MoldStage, NewApprovalEvent, NewTransferRequest, StateChange,
    TransferRequest, TransferState, TransferView, WorkflowOp,
};
use crate::models::transfer::CheckResult;
use crate::store::{MoldStore, TransferStore};

/// Workflow settings, frozen into each request where they affect replay.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Approvals needed to finish one review round.
    pub approval_steps: i32,
    /// Refuse approvals while the mold has recent `moved` reports.
    pub require_stationary: bool,
    pub stationary_days: i64,
    pub max_append_retries: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            approval_steps: 2,
            require_stationary: false,
            stationary_days: 7,
            max_append_retries: 3,
        }
    }
}

/// State derived from an approval event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleProjection {
    pub state: TransferState,
    /// Approvals since the latest `submit`.
    pub approvals_in_round: i32,
    /// Highest step number applied, 0 for an empty log.
    pub last_step: i32,
}

impl Default for LifecycleProjection {
    fn default() -> Self {
        Self {
            state: TransferState::Draft,
            approvals_in_round: 0,
            last_step: 0,
        }
    }
}

impl LifecycleProjection {
    /// Applies one action, or returns `None` when the current state does not
    /// permit it.
    pub fn apply(self, action: ApprovalAction, required_approvals: i32) -> Option<Self> {
        use TransferState::*;

        let (state, approvals_in_round) = match (action, self.state) {
            (ApprovalAction::Submit, Draft | Rejected) => (Submitted, 0),
            (ApprovalAction::Approve, Submitted | UnderReview) => {
                let approvals = self.approvals_in_round + 1;
                if approvals >= required_approvals {
                    (Approved, approvals)
                } else {
                    (UnderReview, approvals)
                }
            }
            (ApprovalAction::Reject, Submitted | UnderReview) => {
                (Rejected, self.approvals_in_round)
            }
            (ApprovalAction::Cancel, Draft | Submitted | UnderReview) => {
                (Cancelled, self.approvals_in_round)
            }
            _ => return None,
        };

        Some(Self {
            state,
            approvals_in_round,
            last_step: self.last_step + 1,
        })
    }

    /// Folds `events` from an empty log. Events must be ordered by step.
    pub fn replay(events: &[ApprovalEvent], required_approvals: i32) -> Result<Self, DomainError> {
        events.iter().try_fold(Self::default(), |projection, event| {
            if event.step_number != projection.last_step + 1 {
                return Err(DomainError::Integrity(format!(
                    "approval log of request {} skips from step {} to {}",
                    event.request_id, projection.last_step, event.step_number
                )));
            }
            projection
                .apply(event.action, required_approvals)
                .ok_or_else(|| {
                    DomainError::Integrity(format!(
                        "approval log of request {} has {} in state {} at step {}",
                        event.request_id, event.action, projection.state, event.step_number
                    ))
                })
        })
    }
}

/// Whether `operation` may run while the request is in `state`.
pub fn permits(operation: WorkflowOp, state: TransferState) -> bool {
    match operation {
        WorkflowOp::Submit => state == TransferState::Draft,
        WorkflowOp::Reopen => state == TransferState::Rejected,
        WorkflowOp::Approve | WorkflowOp::Reject => {
            matches!(state, TransferState::Submitted | TransferState::UnderReview)
        }
        WorkflowOp::Cancel => !state.is_terminal(),
        WorkflowOp::RecordAnswer => state.accepts_answers(),
    }
}

fn action_for(operation: WorkflowOp) -> Option<ApprovalAction> {
    match operation {
        WorkflowOp::Submit | WorkflowOp::Reopen => Some(ApprovalAction::Submit),
        WorkflowOp::Approve => Some(ApprovalAction::Approve),
        WorkflowOp::Reject => Some(ApprovalAction::Reject),
        WorkflowOp::Cancel => Some(ApprovalAction::Cancel),
        WorkflowOp::RecordAnswer => None,
    }
}

/// Drives transfer requests through their lifecycle.
#[derive(Clone)]
pub struct WorkflowEngine {
    transfers: Arc<dyn TransferStore>,
    molds: Arc<dyn MoldStore>,
    checklists: ChecklistService,
    tracker: LocationTracker,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        molds: Arc<dyn MoldStore>,
        checklists: ChecklistService,
        tracker: LocationTracker,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            transfers,
            molds,
            checklists,
            tracker,
            config,
        }
    }

    /// Opens a draft request, pinning `version_id` or the latest version.
    pub async fn create_request(
        &self,
        mold_id: Uuid,
        cycle: InspectionCycle,
        version_id: Option<i64>,
        actor_id: Uuid,
    ) -> Result<TransferRequest, DomainError> {
        if self.molds.find_mold(mold_id).await?.is_none() {
            return Err(DomainError::not_found("Mold", mold_id));
        }
        let version = match version_id {
            Some(id) => self.checklists.find_version(id).await?,
            None => self.checklists.latest_version().await?,
        }
        .ok_or_else(|| {
            DomainError::not_found(
                "Checklist version",
                version_id.map_or_else(|| "latest".to_string(), |id| id.to_string()),
            )
        })?;

        let request = self
            .transfers
            .create_request(NewTransferRequest {
                mold_id,
                cycle,
                checklist_version_id: version.id,
                required_approvals: self.config.approval_steps,
                created_by: actor_id,
            })
            .await?;
        info!(
            request_id = %request.id,
            mold_id = %mold_id,
            version_id = version.id,
            %cycle,
            "Transfer request created"
        );
        Ok(request)
    }

    pub async fn record_answer(
        &self,
        request_id: Uuid,
        item_id: i64,
        result: CheckResult,
        remark: Option<String>,
        attachment_ref: Option<String>,
        actor_id: Uuid,
    ) -> Result<ChecklistAnswer, DomainError> {
        let request = self.require_request(request_id).await?;
        let events = self.transfers.list_events(request_id).await?;
        let current = LifecycleProjection::replay(&events, request.required_approvals)?;
        if !permits(WorkflowOp::RecordAnswer, current.state) {
            return Err(DomainError::InvalidTransition {
                from: current.state,
                operation: WorkflowOp::RecordAnswer,
            });
        }
        let checklist = self
            .checklists
            .materialize(request.checklist_version_id, request.cycle)
            .await?;
        if !checklist.iter().any(|item| item.item_id == item_id) {
            return Err(DomainError::not_found("Checklist item", item_id));
        }

        let answer = self
            .transfers
            .upsert_answer(ChecklistAnswer {
                request_id,
                item_id,
                checked: true,
                result: Some(result),
                remark,
                attachment_ref,
                recorded_by: actor_id,
                recorded_at: Utc::now(),
            })
            .await?;
        info!(request_id = %request_id, item_id, ?result, "Checklist answer recorded");
        Ok(answer)
    }

    pub async fn submit(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        comment: Option<String>,
    ) -> Result<TransferView, DomainError> {
        self.transition(request_id, WorkflowOp::Submit, actor_id, comment)
            .await
    }

    /// Consumes the next approval step. A rejection ends the round at once.
    pub async fn advance_approval(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<TransferView, DomainError> {
        let operation = match decision {
            Decision::Approve => WorkflowOp::Approve,
            Decision::Reject => WorkflowOp::Reject,
        };
        self.transition(request_id, operation, actor_id, comment)
            .await
    }

    pub async fn cancel(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        reason: String,
    ) -> Result<TransferView, DomainError> {
        self.transition(request_id, WorkflowOp::Cancel, actor_id, Some(reason))
            .await
    }

    /// Starts a new review round for a rejected request. Earlier events stay
    /// in the log.
    pub async fn reopen(
        &self,
        request_id: Uuid,
        actor_id: Uuid,
        comment: Option<String>,
    ) -> Result<TransferView, DomainError> {
        self.transition(request_id, WorkflowOp::Reopen, actor_id, comment)
            .await
    }

    pub async fn get(&self, request_id: Uuid) -> Result<TransferView, DomainError> {
        let request = self.require_request(request_id).await?;
        Ok(TransferView {
            answers: self.transfers.list_answers(request_id).await?,
            events: self.transfers.list_events(request_id).await?,
            request,
        })
    }

    pub async fn list_for_mold(&self, mold_id: Uuid) -> Result<Vec<TransferRequest>, DomainError> {
        self.transfers.list_requests_for_mold(mold_id).await
    }

    /// Replays the event log and compares it with the cached state.
    pub async fn verify(&self, request_id: Uuid) -> Result<ConsistencyReport, DomainError> {
        let request = self.require_request(request_id).await?;
        let events = self.transfers.list_events(request_id).await?;
        let replayed = LifecycleProjection::replay(&events, request.required_approvals)?;
        let consistent = replayed.state == request.state;
        if !consistent {
            warn!(
                request_id = %request_id,
                cached = %request.state,
                replayed = %replayed.state,
                "Cached transfer state diverges from its event log"
            );
        }
        Ok(ConsistencyReport {
            request_id,
            cached: request.state,
            replayed: replayed.state,
            consistent,
            events: events.len(),
        })
    }

    /// Item ids the request still has to answer before it can be submitted,
    /// in checklist order.
    pub async fn missing_items(&self, request: &TransferRequest) -> Result<Vec<i64>, DomainError> {
        let checklist = self
            .checklists
            .materialize(request.checklist_version_id, request.cycle)
            .await?;
        let answered: HashSet<i64> = self
            .transfers
            .list_answers(request.id)
            .await?
            .into_iter()
            .filter(|a| a.result.is_some())
            .map(|a| a.item_id)
            .collect();
        Ok(checklist
            .into_iter()
            .filter(|item| item.required && !answered.contains(&item.item_id))
            .map(|item| item.item_id)
            .collect())
    }

    async fn transition(
        &self,
        request_id: Uuid,
        operation: WorkflowOp,
        actor_id: Uuid,
        comment: Option<String>,
    ) -> Result<TransferView, DomainError> {
        let mut attempt = 0;
        loop {
            match self
                .try_transition(request_id, operation, actor_id, comment.clone())
                .await
            {
                Ok(event) => {
                    metrics::counter!(
                        "transfer_transitions_total",
                        "action" => operation.as_str()
                    )
                    .increment(1);
                    let view = self.get(request_id).await?;
                    info!(
                        request_id = %request_id,
                        step = event.step_number,
                        %operation,
                        state = %view.request.state,
                        "Transfer request transitioned"
                    );
                    return Ok(view);
                }
                Err(DomainError::Conflict { key }) if attempt < self.config.max_append_retries => {
                    attempt += 1;
                    warn!(request_id = %request_id, %key, attempt, "Approval step taken, retrying");
                }
                Err(e) => {
                    warn!(request_id = %request_id, %operation, error = %e, "Transition refused");
                    return Err(e);
                }
            }
        }
    }

    async fn try_transition(
        &self,
        request_id: Uuid,
        operation: WorkflowOp,
        actor_id: Uuid,
        comment: Option<String>,
    ) -> Result<ApprovalEvent, DomainError> {
        let request = self.require_request(request_id).await?;
        let events = self.transfers.list_events(request_id).await?;
        let current = LifecycleProjection::replay(&events, request.required_approvals)?;

        let invalid = || DomainError::InvalidTransition {
            from: current.state,
            operation,
        };
        if !permits(operation, current.state) {
            return Err(invalid());
        }
        let action = action_for(operation).ok_or_else(invalid)?;

        match operation {
            WorkflowOp::Submit | WorkflowOp::Reopen => {
                let missing = self.missing_items(&request).await?;
                if !missing.is_empty() {
                    return Err(DomainError::IncompleteChecklist { missing });
                }
            }
            WorkflowOp::Approve if self.config.require_stationary => {
                self.ensure_stationary(request.mold_id).await?;
            }
            _ => {}
        }

        let next = current
            .apply(action, request.required_approvals)
            .ok_or_else(invalid)?;
        let now = Utc::now();

        let promotion = if next.state == TransferState::Approved {
            self.promotion(&request, actor_id).await?
        } else {
            None
        };
        let promoted = promotion.as_ref().map(|p| p.entity.entity_type);

        let change = StateChange {
            state: next.state,
            submitted_at: if action == ApprovalAction::Submit {
                Some(now)
            } else {
                request.submitted_at
            },
            decided_at: match next.state {
                TransferState::Approved | TransferState::Rejected | TransferState::Cancelled => {
                    Some(now)
                }
                _ => None,
            },
            promotion,
        };

        let event = self
            .transfers
            .append_event(
                NewApprovalEvent {
                    request_id,
                    step_number: current.last_step + 1,
                    action,
                    actor_id,
                    comment,
                    occurred_at: now,
                },
                change,
            )
            .await?;
        if let Some(entity_type) = promoted {
            count_recorded(entity_type);
            info!(mold_id = %request.mold_id, "Mold promoted to mass production");
        }
        Ok(event)
    }

    async fn promotion(
        &self,
        request: &TransferRequest,
        actor_id: Uuid,
    ) -> Result<Option<crate::models::NewRevision>, DomainError> {
        let mold = self
            .molds
            .find_mold(request.mold_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Mold", request.mold_id))?;
        let mut promoted = mold.clone();
        promoted.stage = MoldStage::MassProduction;
        Ok(RevisionLog::prepare(
            EntityRef::mold(mold.id),
            actor_id,
            Some(format!("Transfer request {} approved", request.id)),
            &mold.snapshot(),
            &promoted.snapshot(),
        ))
    }

    async fn ensure_stationary(&self, mold_id: Uuid) -> Result<(), DomainError> {
        let since = Duration::try_days(self.config.stationary_days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "stationary window of {} days is out of range",
                    self.config.stationary_days
                ))
            })?;
        match self.tracker.last_moved_since(mold_id, since).await? {
            Some(log) => Err(DomainError::LocationDrift {
                mold_id,
                moved_at: log.reported_at,
                distance_m: log.distance_m,
            }),
            None => Ok(()),
        }
    }

    async fn require_request(&self, request_id: Uuid) -> Result<TransferRequest, DomainError> {
        self.transfers
            .find_request(request_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Transfer request", request_id))
    }
}

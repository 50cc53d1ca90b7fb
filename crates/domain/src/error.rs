//! Domain error taxonomy.
//!
//! Every guard that can reject an operation has its own variant carrying the
//! data a caller needs to fix the request and retry.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{TransferState, WorkflowOp};

#[derive(Debug, Error)]
pub enum DomainError {
    /// Uniqueness violation. `key` names the conflicting key.
    #[error("Conflict: {key}")]
    Conflict { key: String },

    #[error("Checklist version {version_id} is referenced by a transfer request and cannot be modified")]
    ImmutableVersion { version_id: i64 },

    #[error("Checklist incomplete, missing required items: {missing:?}")]
    IncompleteChecklist { missing: Vec<i64> },

    #[error("Cannot {operation} a transfer request in state {from}")]
    InvalidTransition {
        from: TransferState,
        operation: WorkflowOp,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Mold {mold_id} was reported moved at {moved_at}")]
    LocationDrift {
        mold_id: Uuid,
        moved_at: DateTime<Utc>,
        distance_m: Option<f64>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection loss or aborted transaction.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored data that can never be valid, such as an approval log with a
    /// gap or an action its state forbids. Retrying gives the same result.
    #[error("Integrity error: {0}")]
    Integrity(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(key: impl Into<String>) -> Self {
        DomainError::Conflict { key: key.into() }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Storage(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::not_found("row", "query returned no rows"),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().map(str::to_string);
                match db_err.code().as_deref() {
                    Some("23505") => DomainError::Conflict {
                        key: constraint.unwrap_or_else(|| "unique".to_string()),
                    },
                    Some("23503") => DomainError::NotFound {
                        entity: "referenced row",
                        id: constraint.unwrap_or_default(),
                    },
                    _ => DomainError::Storage(db_err.to_string()),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DomainError::Integrity(err.to_string())
            }
            other => DomainError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_checklist_lists_items() {
        let err = DomainError::IncompleteChecklist {
            missing: vec![3, 7],
        };
        assert_eq!(
            err.to_string(),
            "Checklist incomplete, missing required items: [3, 7]"
        );
    }

    #[test]
    fn test_invalid_transition_names_pair() {
        let err = DomainError::InvalidTransition {
            from: TransferState::Cancelled,
            operation: WorkflowOp::Approve,
        };
        assert_eq!(
            err.to_string(),
            "Cannot approve a transfer request in state cancelled"
        );
    }

    #[test]
    fn test_only_storage_is_transient() {
        assert!(DomainError::Storage("connection reset".into()).is_transient());
        assert!(!DomainError::conflict("label").is_transient());
        assert!(!DomainError::not_found("mold", Uuid::nil()).is_transient());
        assert!(!DomainError::Integrity("step gap".into()).is_transient());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DomainError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn test_decode_failure_is_integrity() {
        let err: DomainError = sqlx::Error::Decode("unknown transfer_state".into()).into();
        assert!(matches!(err, DomainError::Integrity(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err: DomainError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
    }
}

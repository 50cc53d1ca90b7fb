use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A workflow or catalog guard refused the operation. `details` carries
    /// what the caller needs to fix and retry.
    #[error("{message}")]
    Rejected {
        status: StatusCode,
        code: &'static str,
        message: String,
        details: Value,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg, None)
            }
            ApiError::Rejected {
                status,
                code,
                message,
                details,
            } => (status, code, message, Some(details)),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::Conflict { key } => ApiError::Rejected {
                status: StatusCode::CONFLICT,
                code: "conflict",
                message,
                details: json!({ "key": key }),
            },
            DomainError::ImmutableVersion { version_id } => ApiError::Rejected {
                status: StatusCode::CONFLICT,
                code: "immutable_version",
                message,
                details: json!({ "versionId": version_id }),
            },
            DomainError::IncompleteChecklist { missing } => ApiError::Rejected {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                code: "incomplete_checklist",
                message,
                details: json!({ "missing": missing }),
            },
            DomainError::InvalidTransition { from, operation } => ApiError::Rejected {
                status: StatusCode::CONFLICT,
                code: "invalid_transition",
                message,
                details: json!({ "from": from, "operation": operation }),
            },
            DomainError::LocationDrift {
                mold_id,
                moved_at,
                distance_m,
            } => ApiError::Rejected {
                status: StatusCode::CONFLICT,
                code: "location_drift",
                message,
                details: json!({
                    "moldId": mold_id,
                    "movedAt": moved_at,
                    "distanceM": distance_m,
                }),
            },
            DomainError::NotFound { .. } => ApiError::NotFound(message),
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::Integrity(msg) => {
                tracing::error!(error = %msg, "Stored data failed integrity check");
                ApiError::Rejected {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "integrity_error",
                    message,
                    details: json!({ "reason": msg }),
                }
            }
            DomainError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage failure");
                ApiError::ServiceUnavailable("Storage temporarily unavailable".into())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            code: "validation_error",
            message,
            details: json!({ "fields": details }),
        }
    }
}

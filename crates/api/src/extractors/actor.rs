//! Caller identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! identity in `X-Actor-Id` and `X-Actor-Role`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Admin,
    Inspector,
}

impl ActorRole {
    /// Unknown or missing roles get the least privilege.
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(role) if role == "admin" => ActorRole::Admin,
            _ => ActorRole::Inspector,
        }
    }
}

/// The identity an operation is attributed to.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    /// Catalog and version mutations are reserved for administrators.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == ActorRole::Admin {
            Ok(())
        } else {
            tracing::warn!(actor_id = %self.id, "Admin role required");
            Err(ApiError::Forbidden("Admin role required".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Actor-Id header".into()))?;
        let id = Uuid::parse_str(id.trim())
            .map_err(|_| ApiError::Unauthorized("X-Actor-Id must be a UUID".into()))?;
        let role = ActorRole::parse(
            parts
                .headers
                .get(ACTOR_ROLE_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        Ok(Actor { id, role })
    }
}

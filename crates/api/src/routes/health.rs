//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: StorageHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageHealth {
    /// `postgres` or `in_memory`.
    pub backend: &'static str,
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness checks.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint. 503 when the database does not answer.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = match &state.pool {
        Some(pool) => {
            let latency = persistence::ping(pool).await.ok();
            StorageHealth {
                backend: "postgres",
                connected: latency.is_some(),
                latency_ms: latency.map(|elapsed| elapsed.as_millis() as u64),
            }
        }
        None => StorageHealth {
            backend: "in_memory",
            connected: true,
            latency_ms: None,
        },
    };

    let status = if storage.connected {
        StatusCode::OK
    } else {
        tracing::warn!("Health check failed: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if storage.connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage,
    };
    (status, Json(response))
}

/// Liveness endpoint.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn in_memory_state() -> AppState {
        let config = Config::load_for_test(&[("database.url", "postgres://unused")]).unwrap();
        AppState::in_memory(config)
    }

    #[tokio::test]
    async fn test_in_memory_backend_is_healthy() {
        let (status, Json(body)) = health_check(State(in_memory_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.storage.backend, "in_memory");
        assert!(body.storage.latency_ms.is_none());
    }

    #[tokio::test]
    async fn test_live() {
        let Json(body) = live().await;
        assert_eq!(body.status, "alive");
    }
}

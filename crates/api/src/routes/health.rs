//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: &'static str,
}

impl StatusResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse::new("alive"))
}

/// Readiness probe endpoint.
///
/// Returns 200 OK when the database answers and the tracker is still
/// consuming events, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let tracker_running = !state.events.is_closed();

    if db_connected && tracker_running {
        Ok(Json(StatusResponse::new("ready")))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_carries_version() {
        let response = StatusResponse::new("alive");
        assert_eq!(response.status, "alive");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_status_response_serialization() {
        let json = serde_json::to_string(&StatusResponse::new("ready")).unwrap();
        assert!(json.contains("\"status\":\"ready\""));
        assert!(json.contains("\"version\""));
    }
}

//! Platform event ingest.
//!
//! A gateway bridge posts each platform event here as JSON. The event is
//! queued for the tracker and acknowledged with `202 Accepted` before it is
//! processed.

use axum::{
    body::Bytes,
    extract::State,
    http::{Extensions, HeaderMap, StatusCode},
    Json,
};
use domain::models::PlatformEvent;
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_event_ingested;
use crate::middleware::{get_request_id, verify_signature, SIGNATURE_HEADER};

/// Acknowledgement for a queued event.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    #[serde(rename = "type")]
    pub event_type: &'static str,
}

/// Queue a platform event for the tracker.
///
/// Returns 401 when an ingest secret is configured and the signature does not
/// match, 400 for an unparseable event, and 503 once the tracker has stopped.
pub async fn ingest_event(
    State(state): State<AppState>,
    extensions: Extensions,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let request_id = get_request_id(&extensions);

    if let Some(secret) = state.config.server.ingest_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret, &body, signature) {
            warn!(request_id = %request_id, error = %e, "Rejected unsigned event");
            return Err(e);
        }
    }

    let event: PlatformEvent = serde_json::from_slice(&body)?;
    let event_type = event.kind();
    debug!(
        request_id = %request_id,
        event = event_type,
        guild_id = ?event.guild_id(),
        "Event received"
    );

    state
        .events
        .send(event)
        .await
        .map_err(|_| ApiError::ServiceUnavailable("Tracker is not running".to_string()))?;
    record_event_ingested(event_type);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            event_type,
        }),
    ))
}

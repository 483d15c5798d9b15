use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::models::PlatformEvent;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{events, health};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// Feeds the tracker's event loop.
    pub events: mpsc::Sender<PlatformEvent>,
}

pub fn create_app(config: Config, pool: PgPool, events: mpsc::Sender<PlatformEvent>) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        pool,
        config: config.clone(),
        events,
    };

    let ingest_routes = Router::new()
        .route("/api/v1/events", post(events::ingest_event))
        .route_layer(middleware::from_fn(metrics_middleware));

    let public_routes = Router::new()
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(ingest_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .with_state(state)
}

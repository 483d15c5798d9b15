use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use domain::services::InviteTracker;
use invite_tracker_api::{
    app, config::Config, discord::DiscordRestPlatform, middleware, observer::spawn_observer,
};
use persistence::db::connect_with_retry;
use persistence::repositories::JoinRecordRepository;
use shared::retry::Retry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting invite tracker v{}", env!("CARGO_PKG_VERSION"));

    let options = config.tracker.to_options();
    let retry = Retry::new(options.retry_policy(), options.verbose());

    // Without storage there is nothing to track; exhaustion ends the process.
    let pool = connect_with_retry(&config.database.pool_config(), &retry)
        .await
        .context("Could not connect to the database")?;

    let repository = JoinRecordRepository::new(pool.clone(), options.model_name())?;
    repository.ensure_schema().await?;

    let platform = DiscordRestPlatform::new(&config.discord)?;
    let tracker = Arc::new(InviteTracker::with_retry(
        Arc::new(platform),
        Arc::new(repository),
        options,
        retry,
    ));
    let observer = spawn_observer(tracker.subscribe());

    let (events_tx, events_rx) = mpsc::channel(config.tracker.event_buffer);
    let tracker_task = tokio::spawn(tracker.clone().run(events_rx));

    let addr = config.socket_addr()?;
    let app = app::create_app(config, pool, events_tx);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last event sender; the tracker drains and stops.
    tracker_task.await?;
    // The observer ends only once the last tracker handle, and with it the
    // notification sender, is dropped.
    drop(tracker);
    observer.await?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Could not listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

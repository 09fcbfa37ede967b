mod api;
mod config;
mod engine;
mod error;
mod gateway;
mod geo;
mod models;
mod observability;
mod state;
mod store;
mod sync;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::gateway::HttpRouteOptimizer;
use crate::store::DeliveryStore;
use crate::sync::ChangeBus;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let bus = ChangeBus::new(config.event_buffer_size);
    let store = DeliveryStore::new(
        config.store_path.clone(),
        config.store_key.clone(),
        bus,
    );
    let optimizer = HttpRouteOptimizer::new(
        config.optimizer_url.clone(),
        Duration::from_millis(config.optimizer_timeout_ms),
    )
    .map_err(|err| error::AppError::Internal(format!("optimizer client: {err}")))?;

    let shared_state = Arc::new(state::AppState::new(store, Arc::new(optimizer)));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, store_key = %config.store_key, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

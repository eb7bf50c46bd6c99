//! ninja-cache proxy entry point.
//!
//! Sits in front of the application origin and runs the offline cache worker
//! on every request: restores the previously active worker, installs and
//! activates the configured version, then serves HTTP until Ctrl-C.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use ninja_cache_client::{FetchClient, FetchConfig, Fetcher, OfflineCacheController, Registration, WorkerConfig};
use ninja_cache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let worker_config = Arc::new(WorkerConfig::from_app_config(&config)?);
    let db = CacheDb::open(&config.db_path).await?;
    let network: Arc<dyn Fetcher> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);

    let registration = Arc::new(Registration::restore(db.clone(), &worker_config, network.clone()).await?);
    let worker = Arc::new(OfflineCacheController::new(worker_config.clone(), db, network.clone()));
    match registration.start(worker).await {
        Ok(outcome) => tracing::info!(?outcome, version = %worker_config.cache_name, "worker updated"),
        Err(e) => tracing::error!(error = %e, version = %worker_config.cache_name, "worker update failed"),
    }

    let state = handler::ProxyState::new(registration.clone(), network, worker_config.origin.clone());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, origin = %worker_config.origin, "starting ninja-cache proxy");

    axum::serve(listener, handler::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registration.settle().await;
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
    }
}

pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Proxy service module

use std::time::Duration;

use modules::logger;
use proxy::server::{build_metrics_router, build_router};
use proxy::{AppState, AxumServer};
use tracing::{error, info};

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Run the proxy until ctrl-c.
pub async fn run() -> error::AppResult<()> {
    // Initialize logger
    logger::init_logger();

    let config_path = modules::config::get_config_path()?;
    let config = modules::config::load_app_config()?;
    info!("Loaded config from {:?}", config_path);

    let state = AppState::new(&config.proxy)?;

    // Credentials hot reload: file watcher -> credential watcher
    let (snapshots, watcher_handle) =
        modules::config::watch_config(config_path, CONFIG_POLL_INTERVAL);
    let credentials_handle = state.credentials.clone().spawn(snapshots);

    let metrics_server = match config.proxy.metrics_port {
        Some(port) => {
            let app = build_metrics_router(state.metrics.clone());
            Some(AxumServer::start(config.proxy.get_bind_address(), port, app).await?)
        }
        None => None,
    };

    info!(
        "github-proxy: forwarding to {} (log_requests: {}, max_concurrent_upstream: {})",
        state.upstream.base_url(),
        config.proxy.log_requests,
        state.gate.capacity()
    );
    let (server, server_handle) = AxumServer::start(
        config.proxy.get_bind_address(),
        config.proxy.port,
        build_router(state),
    )
    .await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    server.stop();
    server_handle.await.ok();
    if let Some((metrics_server, metrics_handle)) = metrics_server {
        metrics_server.stop();
        metrics_handle.await.ok();
    }
    watcher_handle.abort();
    credentials_handle.abort();

    Ok(())
}

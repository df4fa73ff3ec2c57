use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use dispatch_dashboard::backend::HttpBackend;
use dispatch_dashboard::config::Config;
use dispatch_dashboard::server;
use dispatch_dashboard::session::Session;
use dispatch_dashboard::state::Dashboard;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 1. Configuration and backend client
    let config = Config::from_env();
    let backend = HttpBackend::new(&config.backend_url, config.request_timeout)
        .context("building backend HTTP client")?;
    tracing::info!(backend = %config.backend_url, "initializing dashboard state");
    let state = Arc::new(Dashboard::new(Arc::new(backend), &config));

    // 2. Load Persistence (Recovery)
    if let Err(e) = state.history.load(&config.data_dir) {
        tracing::warn!(error = %e, "failed to load previous status history");
    }

    // 3. Poll, route and persistence loops
    let mut session = Session::new(state.clone(), &config);
    session.start();

    // 4. View API
    let (addr, server) = warp::serve(server::routes(state.clone()))
        .try_bind_ephemeral(([0, 0, 0, 0], config.port))
        .with_context(|| format!("binding view API on port {}", config.port))?;
    tokio::spawn(server);
    tracing::info!(%addr, "view API listening");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    session.stop();
    session.join().await;
    Ok(())
}

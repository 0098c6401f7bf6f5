//! convergence server entry point.
//!
//! Boots the mirror on the configured port. Logging goes to stderr as JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use convergence_client::{Mirror, ProxyPassthrough, TransformConfig, Transformer, UpstreamClient, UpstreamConfig};
use convergence_core::{AppConfig, CacheStore};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    let cache = Arc::new(CacheStore::new(&config.cache.to_cache_config()));
    cache.spawn_sweepers();

    let upstream_config = UpstreamConfig::from_app_config(&config)?;
    let upstream = UpstreamClient::new(upstream_config.clone())?;
    let transformer = Transformer::new(TransformConfig::from_app_config(&config)?);
    let mirror = Mirror::new(upstream, Arc::clone(&cache), Arc::new(transformer));
    let proxy = ProxyPassthrough::new(upstream_config, Arc::clone(&cache))?;

    let state = routes::AppState::new(mirror, proxy, &config);
    let app = routes::build_app(state, &config.local_root);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        upstream = %config.base_url,
        local_root = %config.local_root,
        "Starting convergence mirror"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    cache.teardown();
    tracing::info!("convergence mirror stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

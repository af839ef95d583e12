//! smartlist - search endpoint over a bulk-imported record dataset
//!
//! Serves `GET /api/search` for list clients. The dataset is parsed once,
//! on startup if possible and otherwise on the first request.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use smartlist::config::Config;
use smartlist::paths;
use smartlist::server::{self, SearchState};
use smartlist::source::RecordCache;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartlist=info".parse()?),
        )
        .init();

    paths::log_paths();
    let config = Config::load(paths::config_path()).context("failed to load config")?;

    let cache = Arc::new(RecordCache::new(&config.server.dataset));
    match cache.ensure_loaded().await {
        Ok(store) => info!("{} records loaded", store.len()),
        // requests retry the load and answer 500 until it succeeds
        Err(e) => warn!(error = %e, "dataset not loaded at startup"),
    }

    let state = Arc::new(SearchState {
        cache,
        max_limit: config.server.max_limit,
    });

    let (addr, handle) = server::start_server(config.server.listen_addr, state).await?;
    info!("serving http://{}/api/search", addr);

    tokio::select! {
        result = handle => result.context("search server task failed")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}

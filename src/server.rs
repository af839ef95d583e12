//! HTTP search endpoint
//!
//! `GET /api/search?query=&page=&limit=` answers with one page of records
//! as JSON. Empty results are still 200; a dataset that cannot be loaded
//! yields 500 with an empty page and an `error` field.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::record::{PageRequest, PageResponse, DEFAULT_LIMIT};
use crate::source::{RecordCache, LOAD_FAILED};

/// Shared state for the search endpoint
pub struct SearchState {
    pub cache: Arc<RecordCache>,
    pub max_limit: u32,
}

/// Query string of `/api/search`
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

pub fn router(state: Arc<SearchState>) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .with_state(state)
}

#[instrument(skip_all, fields(query = %params.query, page = params.page, limit = params.limit))]
async fn search(
    State(state): State<Arc<SearchState>>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<PageResponse>) {
    let request =
        PageRequest::new(params.query, params.page, params.limit).capped(state.max_limit);

    match state.cache.ensure_loaded().await {
        Ok(store) => (StatusCode::OK, Json(store.search(&request))),
        Err(e) => {
            error!(error = %e, "search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PageResponse::failed(LOAD_FAILED)),
            )
        }
    }
}

/// Bind `addr` and serve the search endpoint in a background task.
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<SearchState>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr()?;
    info!(addr = %local, "search endpoint listening");

    let app = router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("search server error: {}", e);
        }
    });

    Ok((local, handle))
}

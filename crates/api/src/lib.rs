//! REST API for the hybrid search engine.
//!
//! Exposes the corpus scanner and the `HybridSearcher` over HTTP. Routing and
//! server startup follow the teacher's `api-server` crate: a `Clone`-able
//! state struct, a `build_router` free function, and a `start_server` wrapper
//! around `axum::serve`.

mod handlers;
pub mod types;

use axum::routing::{get, post};
use axum::Router;
use catalogue_discovery::Discovery;
use catalogue_search_engine::HybridSearcher;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::*;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub searcher: Arc<HybridSearcher>,
    pub discovery: Arc<Discovery>,
}

impl ApiState {
    #[must_use]
    pub fn new(searcher: Arc<HybridSearcher>, discovery: Arc<Discovery>) -> Self {
        Self { searcher, discovery }
    }
}

/// Build the API router with all routes and middleware attached.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/search", post(handlers::search))
        .route("/similar-documents/:chunk_id", get(handlers::similar_documents))
        .route("/context/:chunk_id", get(handlers::context))
        .route("/metadata", get(handlers::metadata))
        .route("/scan", post(handlers::scan))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server on `addr`, serving until the process is killed.
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!(addr, "starting catalogue search API");
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

//! Catalogue search API binary entry point.

use catalogue_api::{start_server, ApiState};
use catalogue_discovery::{Discovery, DiscoveryConfig};
use catalogue_embeddings::{EmbeddingAdapter, EmbeddingConfig};
use catalogue_indexer::{IndexerConfig, OpenSearchIndexer};
use catalogue_search_engine::{HybridSearcher, SearchConfig};
use catalogue_state::StateStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalogue_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("API_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let corpus_root = std::env::var("CATALOGUE_CORPUS_ROOT").unwrap_or_else(|_| ".".to_string());
    let state_path = std::env::var("CATALOGUE_STATE_PATH")
        .unwrap_or_else(|_| "catalogue_state.redb".to_string());

    let state_store = Arc::new(StateStore::open(&state_path)?);
    let indexer = Arc::new(OpenSearchIndexer::new(IndexerConfig::default())?);
    let embeddings = Arc::new(EmbeddingAdapter::new(EmbeddingConfig::default()));

    let discovery = Arc::new(Discovery::new(
        DiscoveryConfig {
            corpus_root: corpus_root.into(),
            ..DiscoveryConfig::default()
        },
        state_store,
        indexer.clone(),
        embeddings.clone(),
    ));

    let searcher = Arc::new(HybridSearcher::new(SearchConfig::default(), embeddings, None)?);

    let state = ApiState::new(searcher, discovery);

    tracing::info!("starting catalogue search API");
    start_server(&addr, state).await?;

    Ok(())
}

//! `catalogue` — runs a one-shot or continuously-watched corpus scan
//! (discovery, OCR, paragraph reconstruction, chunking, embedding, and
//! indexing) without the HTTP API surface `catalogue-api` exposes.

mod settings;

use catalogue_api::{start_server, ApiState};
use catalogue_discovery::{sleep_between_scans, Discovery, DiscoveryConfig, WorkItemKind};
use catalogue_embeddings::{EmbeddingAdapter, EmbeddingConfig};
use catalogue_indexer::{IndexerConfig, OpenSearchIndexer};
use catalogue_search_engine::{HybridSearcher, SearchConfig};
use catalogue_state::StateStore;
use clap::{Parser, Subcommand};
use settings::Settings;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "catalogue", about = "Multilingual PDF ingestion and indexing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the configured corpus root once, or continuously if `--watch` is given.
    Scan {
        /// Re-scan every N seconds instead of exiting after the first pass.
        #[arg(long)]
        watch: Option<u64>,
    },
    /// Start the search API without running a scan.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalogue_cli=info,catalogue_discovery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    let state_store = Arc::new(StateStore::open(&settings.state_path)?);
    let indexer = Arc::new(OpenSearchIndexer::new(IndexerConfig::default())?);
    let embeddings = Arc::new(EmbeddingAdapter::new(EmbeddingConfig::default()));

    match cli.command {
        Command::Scan { watch } => {
            let discovery = Discovery::new(
                DiscoveryConfig {
                    corpus_root: settings.corpus_root.clone().into(),
                    ocr_pool_size: settings.ocr_pool_size,
                    embed_pool_size: settings.embed_pool_size,
                    rasterize_target_width: settings.rasterize_target_width,
                    scan_concurrency: settings.scan_concurrency,
                },
                state_store,
                indexer,
                embeddings,
            );

            match watch {
                Some(interval_secs) => {
                    tracing::info!(interval_secs, "starting watch loop");
                    loop {
                        run_scan(&discovery).await;
                        sleep_between_scans(Duration::from_secs(interval_secs)).await;
                    }
                }
                None => run_scan(&discovery).await,
            }
        }
        Command::Serve { addr } => {
            let discovery = Arc::new(Discovery::new(
                DiscoveryConfig {
                    corpus_root: settings.corpus_root.clone().into(),
                    ocr_pool_size: settings.ocr_pool_size,
                    embed_pool_size: settings.embed_pool_size,
                    rasterize_target_width: settings.rasterize_target_width,
                    scan_concurrency: settings.scan_concurrency,
                },
                state_store,
                indexer,
                embeddings.clone(),
            ));
            let searcher = Arc::new(HybridSearcher::new(SearchConfig::default(), embeddings, None)?);
            let state = ApiState::new(searcher, discovery);

            tracing::info!(%addr, "starting catalogue search API");
            start_server(&addr, state).await?;
        }
    }

    Ok(())
}

/// Runs a single scan to completion and logs a summary. Per-file failures
/// surface in `ScanPlan::failed_count` and are retried on the next scan by
/// `Discovery::classify_corpus`, so they are not treated as process-level
/// errors. Only a fatal `DiscoveryError` (corpus root unreadable, state
/// store I/O failure) aborts the process.
async fn run_scan(discovery: &Discovery) {
    let scan_id = uuid::Uuid::new_v4();
    tracing::info!(%scan_id, "scan starting");

    match discovery.scan().await {
        Ok(plan) => {
            let new = plan
                .items
                .iter()
                .filter(|i| i.kind == WorkItemKind::New)
                .count();
            let changed = plan
                .items
                .iter()
                .filter(|i| i.kind == WorkItemKind::ContentChanged)
                .count();
            let config_changed = plan
                .items
                .iter()
                .filter(|i| i.kind == WorkItemKind::ConfigChanged)
                .count();
            let deleted = plan
                .items
                .iter()
                .filter(|i| i.kind == WorkItemKind::Deleted)
                .count();
            tracing::info!(
                %scan_id,
                total = plan.items.len(),
                new,
                changed,
                config_changed,
                deleted,
                completed = plan.completed_count(),
                failed = plan.failed_count(),
                "scan complete",
            );
        }
        Err(err) => {
            tracing::error!(%scan_id, error = %err, "scan failed");
            std::process::exit(1);
        }
    }
}

//! Discovery Engine: walks the corpus, classifies each PDF against the
//! State Store, and drives the per-document ingest pipeline (rasterize ->
//! OCR -> classify -> paragraph -> chunk -> embed -> index).
//!
//! Grounded in the teacher's `TaskGraph`/`Orchestrator` (`video-audio-orchestrator`):
//! `WorkItem`/`WorkItemState` mirror `Task`/`TaskState`, but there is no
//! inter-document dependency graph to schedule — documents are independent,
//! so a bounded `tokio::task::JoinSet` fan-out replaces the teacher's
//! ready-task polling loop. The only dependency that matters is the
//! intra-document pipeline order, which is just sequential `.await?`
//! chaining inside one spawned task.

use catalogue_chunker::{strategy_for, ChunkStrategy};
use catalogue_classify::LineClassifier;
use catalogue_common::{
    sha256_hex, FileState, FileStatus, IndexedRecord, Language, PageGeometry, Tag,
};
use catalogue_config::{config_hash, resolve_config, ConfigError};
use catalogue_embeddings::EmbeddingAdapter;
use catalogue_indexer::Indexer;
use catalogue_ocr::pdf::{content_fingerprint, extract_bookmarks, rasterize_pages, PdfError};
use catalogue_ocr::{ocr, OcrConfig, OcrError};
use catalogue_paragraph::{generate_paragraphs, TaggedLine};
use catalogue_state::{StateStore, StateStoreError};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("state store error: {0}")]
    State(#[from] StateStoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("pdf error: {0}")]
    Pdf(#[from] PdfError),

    #[error("ocr error: {0}")]
    Ocr(#[from] OcrError),

    #[error("index error: {0}")]
    Index(#[from] catalogue_indexer::IndexError),

    #[error("embedding error: {0}")]
    Embedding(#[from] catalogue_embeddings::EmbeddingError),

    #[error("classify error: {0}")]
    Classify(#[from] catalogue_classify::ClassifyError),

    #[error("fatal: {0}")]
    Fatal(String),
}

/// How a discovered path compares against its recorded `FileState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemKind {
    New,
    ContentChanged,
    ConfigChanged,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone)]
pub enum WorkItemState {
    Pending,
    Running,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub path: PathBuf,
    pub kind: WorkItemKind,
    pub state: WorkItemState,
}

/// One discovery pass: every path seen, classified, with its outcome filled
/// in as execution proceeds.
#[derive(Debug, Clone, Default)]
pub struct ScanPlan {
    pub items: Vec<WorkItem>,
}

impl ScanPlan {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.state, WorkItemState::Failed(_)))
            .count()
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.state, WorkItemState::Completed))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub corpus_root: PathBuf,
    pub ocr_pool_size: usize,
    pub embed_pool_size: usize,
    pub rasterize_target_width: u32,
    pub scan_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from("."),
            ocr_pool_size: 4,
            embed_pool_size: 2,
            rasterize_target_width: 1600,
            scan_concurrency: 8,
        }
    }
}

/// Coordinates one corpus scan: enumeration, per-document classification,
/// and bounded-concurrency pipeline execution.
pub struct Discovery {
    config: DiscoveryConfig,
    state: Arc<StateStore>,
    indexer: Arc<dyn Indexer>,
    embeddings: Arc<EmbeddingAdapter>,
    ocr_pool: Arc<Semaphore>,
    embed_pool: Arc<Semaphore>,
    /// Serializes indexing per `doc_id`, mirroring the teacher's use of
    /// `dashmap` for a sharded per-key lock table.
    doc_locks: DashMap<String, Arc<Mutex<()>>>,
    cancellation: CancellationToken,
}

impl Discovery {
    #[must_use]
    pub fn new(
        config: DiscoveryConfig,
        state: Arc<StateStore>,
        indexer: Arc<dyn Indexer>,
        embeddings: Arc<EmbeddingAdapter>,
    ) -> Self {
        Self {
            ocr_pool: Arc::new(Semaphore::new(config.ocr_pool_size)),
            embed_pool: Arc::new(Semaphore::new(config.embed_pool_size)),
            config,
            state,
            indexer,
            embeddings,
            doc_locks: DashMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn doc_lock(&self, doc_id: &str) -> Arc<Mutex<()>> {
        self.doc_locks
            .entry(doc_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Enumerate every `.pdf` under the corpus root and classify it against
    /// the State Store. Content hashing is lazy: only recomputed when mtime
    /// or size changed since the last recorded scan.
    pub async fn classify_corpus(&self) -> Result<ScanPlan, DiscoveryError> {
        let mut plan = ScanPlan::default();
        let mut seen_paths = std::collections::HashSet::new();

        for entry in WalkDir::new(&self.config.corpus_root)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pdf") {
                continue;
            }
            let path_key = path.to_string_lossy().into_owned();
            seen_paths.insert(path_key.clone());

            let kind = self.classify_one(path, &path_key).await?;
            plan.items.push(WorkItem {
                path: path.to_path_buf(),
                kind,
                state: WorkItemState::Pending,
            });
        }

        for existing in self.state.all().await? {
            if !seen_paths.contains(&existing.path) && existing.status != FileStatus::Failed {
                plan.items.push(WorkItem {
                    path: PathBuf::from(&existing.path),
                    kind: WorkItemKind::Deleted,
                    state: WorkItemState::Pending,
                });
            }
        }

        Ok(plan)
    }

    async fn classify_one(&self, path: &Path, path_key: &str) -> Result<WorkItemKind, DiscoveryError> {
        let existing = self.state.get(path_key).await?;
        let Some(existing) = existing else {
            return Ok(WorkItemKind::New);
        };

        let metadata = std::fs::metadata(path).map_err(|e| DiscoveryError::Fatal(e.to_string()))?;
        let mtime_secs = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let size_bytes = metadata.len();

        let resolved = resolve_config(&self.config.corpus_root, path)?;
        let new_config_hash = config_hash(&resolved);

        let content_changed = if mtime_secs != existing.last_mtime_secs || size_bytes != existing.last_size_bytes {
            content_fingerprint(path)? != existing.pdf_sha256
        } else {
            false
        };

        if content_changed {
            Ok(WorkItemKind::ContentChanged)
        } else if new_config_hash != existing.config_hash {
            Ok(WorkItemKind::ConfigChanged)
        } else {
            Ok(WorkItemKind::Unchanged)
        }
    }

    /// Run one full discovery pass: classify, then execute every non-`Unchanged`
    /// item on a bounded `JoinSet`, updating `state` as each completes.
    pub async fn scan(&self) -> Result<ScanPlan, DiscoveryError> {
        let mut plan = self.classify_corpus().await?;
        let mut join_set = tokio::task::JoinSet::new();
        let concurrency = Arc::new(Semaphore::new(self.config.scan_concurrency));

        for (idx, item) in plan.items.iter().enumerate() {
            if item.kind == WorkItemKind::Unchanged {
                continue;
            }
            let permit = concurrency.clone();
            let path = item.path.clone();
            let kind = item.kind;
            let this_path_key = path.to_string_lossy().into_owned();
            let token = self.cancellation.clone();

            let state = self.state.clone();
            let indexer = self.indexer.clone();
            let embeddings = self.embeddings.clone();
            let ocr_pool = self.ocr_pool.clone();
            let embed_pool = self.embed_pool.clone();
            let corpus_root = self.config.corpus_root.clone();
            let rasterize_width = self.config.rasterize_target_width;
            let doc_lock = self.doc_lock(&sha256_hex(this_path_key.as_bytes()));

            join_set.spawn(async move {
                let _permit = permit.acquire_owned().await.ok();
                if token.is_cancelled() {
                    return (idx, WorkItemState::Failed("cancelled".to_string()));
                }
                let _doc_guard = doc_lock.lock().await;

                let result = if kind == WorkItemKind::Deleted {
                    delete_document(&state, &indexer, &this_path_key).await
                } else if kind == WorkItemKind::ConfigChanged {
                    update_metadata_only(&corpus_root, &path, &state, &indexer).await
                } else {
                    process_document(
                        &corpus_root,
                        &path,
                        rasterize_width,
                        &state,
                        &indexer,
                        &embeddings,
                        &ocr_pool,
                        &embed_pool,
                        &token,
                    )
                    .await
                };

                match result {
                    Ok(()) => (idx, WorkItemState::Completed),
                    Err(e) => {
                        warn!(path = %this_path_key, error = %e, "document pipeline failed, marking FAILED");
                        (idx, WorkItemState::Failed(e.to_string()))
                    }
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, state)) => plan.items[idx].state = state,
                Err(e) => warn!(error = %e, "document task panicked"),
            }
        }

        info!(
            completed = plan.completed_count(),
            failed = plan.failed_count(),
            total = plan.items.len(),
            "scan complete"
        );
        Ok(plan)
    }
}

async fn delete_document(
    state: &StateStore,
    indexer: &Arc<dyn Indexer>,
    path_key: &str,
) -> Result<(), DiscoveryError> {
    let doc_id = sha256_hex(path_key.as_bytes());
    indexer.delete_doc(&doc_id).await?;
    state.delete(path_key).await?;
    Ok(())
}

/// CONFIG_CHANGED path: re-index `categories`/`bookmarks` for every chunk of
/// `doc_id` in place. Chunk text and vectors are never touched, and OCR,
/// classification, paragraph generation, chunking, and embedding are all
/// skipped entirely.
async fn update_metadata_only(
    corpus_root: &Path,
    path: &Path,
    state: &StateStore,
    indexer: &Arc<dyn Indexer>,
) -> Result<(), DiscoveryError> {
    let path_key = path.to_string_lossy().into_owned();
    let doc_id = sha256_hex(path_key.as_bytes());

    let existing = state
        .get(&path_key)
        .await?
        .ok_or_else(|| DiscoveryError::Fatal(format!("no prior state for {path_key}")))?;

    let resolved = resolve_config(corpus_root, path)?;
    let resolved_hash = config_hash(&resolved);
    let bookmarks = extract_bookmarks(path)?;
    let bookmarks_hash = sha256_hex(bookmarks.join("\u{1}").as_bytes());

    indexer
        .update_metadata(&doc_id, &resolved.categories, &bookmarks)
        .await?;

    let metadata = std::fs::metadata(path).map_err(|e| DiscoveryError::Fatal(e.to_string()))?;
    let mtime_secs = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    state
        .upsert(FileState {
            path: path_key,
            pdf_sha256: existing.pdf_sha256,
            config_hash: resolved_hash,
            bookmarks_hash,
            last_indexed_at: Some(chrono::Utc::now()),
            status: FileStatus::Indexed,
            last_mtime_secs: mtime_secs,
            last_size_bytes: metadata.len(),
            last_error: None,
        })
        .await?;

    info!(doc_id, "metadata-only reindex complete");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn process_document(
    corpus_root: &Path,
    path: &Path,
    rasterize_width: u32,
    state: &StateStore,
    indexer: &Arc<dyn Indexer>,
    embeddings: &Arc<EmbeddingAdapter>,
    ocr_pool: &Arc<Semaphore>,
    embed_pool: &Arc<Semaphore>,
    token: &CancellationToken,
) -> Result<(), DiscoveryError> {
    let path_key = path.to_string_lossy().into_owned();
    let doc_id = sha256_hex(path_key.as_bytes());
    let pdf_sha256 = content_fingerprint(path)?;
    let resolved = resolve_config(corpus_root, path)?;
    let resolved_hash = config_hash(&resolved);

    let bookmarks = extract_bookmarks(path)?;
    let bookmarks_hash = sha256_hex(bookmarks.join("\u{1}").as_bytes());
    let original_filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pages = rasterize_pages(path, rasterize_width)?;
    let classifier = LineClassifier::new(&resolved)?;
    let ocr_config = OcrConfig {
        language: tesseract_language_code(&resolved.language),
        min_confidence: resolved.min_confidence,
        top_crop_percent: resolved.margin_crop_percent,
        bottom_crop_percent: resolved.margin_crop_percent,
        ..OcrConfig::default()
    };

    let mut tagged_lines = Vec::new();
    let mut line_index = 0usize;
    for page in &pages {
        if token.is_cancelled() {
            return Err(DiscoveryError::Fatal("cancelled".to_string()));
        }
        let _permit = ocr_pool.acquire().await.ok();
        let lines = ocr(page, &ocr_config)?;

        let geometry = PageGeometry {
            page_left_margin: 0.0,
            page_right_margin: page.width as f32,
        };

        for mut line in lines {
            let tags = classifier.classify(&line, &geometry);
            line.tags = tags.into_iter().collect::<Vec<Tag>>();
            tagged_lines.push(TaggedLine {
                text: line.text,
                page_num: line.page_num,
                original_line_index: line_index,
                tags: line.tags,
                geometry_present: true,
            });
            line_index += 1;
        }
    }

    let generation = generate_paragraphs(tagged_lines);
    if generation.warnings > 0 {
        warn!(doc_id, warnings = generation.warnings, "classification warnings during paragraph generation");
    }

    let embed_clone = embeddings.clone();
    let embed_batch_fn: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync> =
        Box::new(move |texts: &[String]| {
            let texts = texts.to_vec();
            let embed_clone = embed_clone.clone();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(async move {
                    embed_clone.embed_batch(&texts).await.unwrap_or_default()
                })
            })
        });
    let strategy: Box<dyn ChunkStrategy> = strategy_for(&resolved, embed_batch_fn);
    let chunks = strategy.chunk(&doc_id, &generation.paragraphs, &resolved);

    let language = language_for(&resolved.language);
    let mut records = Vec::with_capacity(chunks.len());
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

    let _permit = embed_pool.acquire().await.ok();
    let vectors = embeddings.embed_batch(&texts).await?;
    drop(_permit);

    for (chunk, vector) in chunks.into_iter().zip(vectors.into_iter()) {
        let mut record = IndexedRecord {
            chunk_id: chunk.chunk_id,
            doc_id: doc_id.clone(),
            page_num: chunk.page_num,
            text_content_hi: String::new(),
            text_content_gu: String::new(),
            text_content_en: String::new(),
            vector_embedding: vector,
            categories: resolved.categories.clone(),
            bookmarks: bookmarks.clone(),
            original_filename: original_filename.clone(),
            seq_num: chunk.paragraph_seq_num,
        };
        record.set_text(language, chunk.text);
        records.push(record);
    }

    indexer.index_chunks(&doc_id, &records).await?;

    let metadata = std::fs::metadata(path).map_err(|e| DiscoveryError::Fatal(e.to_string()))?;
    let mtime_secs = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    state
        .upsert(FileState {
            path: path_key,
            pdf_sha256,
            config_hash: resolved_hash,
            bookmarks_hash,
            last_indexed_at: Some(chrono::Utc::now()),
            status: FileStatus::Indexed,
            last_mtime_secs: mtime_secs,
            last_size_bytes: metadata.len(),
            last_error: None,
        })
        .await?;

    Ok(())
}

fn tesseract_language_code(language: &str) -> String {
    match language {
        "hi" => "hin".to_string(),
        "gu" => "guj".to_string(),
        "en" => "eng".to_string(),
        other => other.to_string(),
    }
}

fn language_for(language: &str) -> Language {
    match language {
        "gu" => Language::Gujarati,
        "en" => Language::English,
        _ => Language::Hindi,
    }
}

/// Sleep helper used by callers that want to poll `scan` on an interval;
/// kept here rather than in the CLI so both the CLI and a future scheduled
/// daemon can share the same loop shape.
pub async fn sleep_between_scans(interval: Duration) {
    tokio::time::sleep(interval).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tesseract_language_code_maps_known_codes() {
        assert_eq!(tesseract_language_code("hi"), "hin");
        assert_eq!(tesseract_language_code("gu"), "guj");
        assert_eq!(tesseract_language_code("en"), "eng");
    }

    #[test]
    fn language_for_defaults_to_hindi() {
        assert_eq!(language_for("xx"), Language::Hindi);
        assert_eq!(language_for("gu"), Language::Gujarati);
        assert_eq!(language_for("en"), Language::English);
    }

    #[test]
    fn scan_plan_counts_completed_and_failed() {
        let plan = ScanPlan {
            items: vec![
                WorkItem {
                    path: PathBuf::from("a.pdf"),
                    kind: WorkItemKind::New,
                    state: WorkItemState::Completed,
                },
                WorkItem {
                    path: PathBuf::from("b.pdf"),
                    kind: WorkItemKind::New,
                    state: WorkItemState::Failed("x".to_string()),
                },
            ],
        };
        assert_eq!(plan.completed_count(), 1);
        assert_eq!(plan.failed_count(), 1);
    }

    #[tokio::test]
    async fn classify_corpus_marks_new_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("book.pdf"), b"%PDF-1.4 fake").unwrap();
        let state = Arc::new(StateStore::open(dir.path().join("state.redb")).unwrap());

        struct NoopIndexer;
        #[async_trait::async_trait]
        impl Indexer for NoopIndexer {
            async fn index_chunks(&self, _: &str, _: &[IndexedRecord]) -> catalogue_indexer::IndexResult<()> {
                Ok(())
            }
            async fn update_metadata(
                &self,
                _: &str,
                _: &BTreeMap<String, Vec<String>>,
                _: &[String],
            ) -> catalogue_indexer::IndexResult<()> {
                Ok(())
            }
            async fn delete_doc(&self, _: &str) -> catalogue_indexer::IndexResult<()> {
                Ok(())
            }
            async fn list_doc_ids(&self) -> catalogue_indexer::IndexResult<Vec<String>> {
                Ok(vec![])
            }
        }

        let discovery = Discovery::new(
            DiscoveryConfig {
                corpus_root: dir.path().to_path_buf(),
                ..DiscoveryConfig::default()
            },
            state,
            Arc::new(NoopIndexer),
            Arc::new(EmbeddingAdapter::new(catalogue_embeddings::EmbeddingConfig::default())),
        );

        let plan = discovery.classify_corpus().await.unwrap();
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].kind, WorkItemKind::New);
    }

    #[tokio::test]
    async fn classify_corpus_detects_config_changed_without_content_change() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("book.pdf");
        std::fs::write(&pdf_path, b"%PDF-1.4 fake").unwrap();
        let state = Arc::new(StateStore::open(dir.path().join("state.redb")).unwrap());

        let path_key = pdf_path.to_string_lossy().into_owned();
        let metadata = std::fs::metadata(&pdf_path).unwrap();
        let mtime_secs = metadata
            .modified()
            .unwrap()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        state
            .upsert(FileState {
                path: path_key,
                pdf_sha256: content_fingerprint(&pdf_path).unwrap(),
                config_hash: "stale-hash-that-will-never-match".to_string(),
                bookmarks_hash: String::new(),
                last_indexed_at: None,
                status: FileStatus::Indexed,
                last_mtime_secs: mtime_secs,
                last_size_bytes: metadata.len(),
                last_error: None,
            })
            .await
            .unwrap();

        struct NoopIndexer;
        #[async_trait::async_trait]
        impl Indexer for NoopIndexer {
            async fn index_chunks(&self, _: &str, _: &[IndexedRecord]) -> catalogue_indexer::IndexResult<()> {
                Ok(())
            }
            async fn update_metadata(
                &self,
                _: &str,
                _: &BTreeMap<String, Vec<String>>,
                _: &[String],
            ) -> catalogue_indexer::IndexResult<()> {
                Ok(())
            }
            async fn delete_doc(&self, _: &str) -> catalogue_indexer::IndexResult<()> {
                Ok(())
            }
            async fn list_doc_ids(&self) -> catalogue_indexer::IndexResult<Vec<String>> {
                Ok(vec![])
            }
        }

        let discovery = Discovery::new(
            DiscoveryConfig {
                corpus_root: dir.path().to_path_buf(),
                ..DiscoveryConfig::default()
            },
            state,
            Arc::new(NoopIndexer),
            Arc::new(EmbeddingAdapter::new(catalogue_embeddings::EmbeddingConfig::default())),
        );

        let plan = discovery.classify_corpus().await.unwrap();
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].kind, WorkItemKind::ConfigChanged);
    }
}

//! Indexer: writes `IndexedRecord`s into the hybrid search cluster.
//!
//! The teacher's `storage` crate fuses a pure vector store (Qdrant) with a
//! separate metadata database (Postgres) in application code. This spec
//! names a single hybrid cluster holding lexical text, keyword metadata, and
//! the dense vector side by side in one document, so we swap the teacher's
//! `qdrant-client` dependency for `opensearch` (the official Rust client for
//! OpenSearch/Elasticsearch-compatible clusters) while keeping the teacher's
//! shape: a `*Config` struct with `Default`, a storage trait, and an
//! `IndexError`/`IndexResult` pair following the teacher's
//! `StorageError`/`StorageResult` naming.

use async_trait::async_trait;
use catalogue_common::IndexedRecord;
use opensearch::http::transport::Transport;
use opensearch::{BulkParts, DeleteByQueryParts, OpenSearch, SearchParts};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub url: String,
    pub index: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("CATALOGUE_SEARCH_URL")
                .unwrap_or_else(|_| "https://localhost:9200".to_string()),
            index: std::env::var("CATALOGUE_SEARCH_INDEX")
                .unwrap_or_else(|_| "catalogue_chunks".to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("search cluster error: {0}")]
    Cluster(String),

    #[error("bulk indexing partially failed: {failed}/{total} items")]
    PartialBulkFailure { failed: usize, total: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Storage-layer contract for the search cluster, the `VectorStorage`
/// equivalent for this pipeline.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Deletes any existing chunks for `doc_id`, then bulk-inserts `records`.
    async fn index_chunks(&self, doc_id: &str, records: &[IndexedRecord]) -> IndexResult<()>;

    /// Bulk partial-update of `categories`/`bookmarks` for every chunk of
    /// `doc_id`; text and vector fields are left untouched.
    async fn update_metadata(
        &self,
        doc_id: &str,
        categories: &BTreeMap<String, Vec<String>>,
        bookmarks: &[String],
    ) -> IndexResult<()>;

    async fn delete_doc(&self, doc_id: &str) -> IndexResult<()>;

    async fn list_doc_ids(&self) -> IndexResult<Vec<String>>;
}

pub struct OpenSearchIndexer {
    client: OpenSearch,
    index: String,
}

impl OpenSearchIndexer {
    pub fn new(config: IndexerConfig) -> IndexResult<Self> {
        let transport =
            Transport::single_node(&config.url).map_err(|e| IndexError::Cluster(e.to_string()))?;
        Ok(Self {
            client: OpenSearch::new(transport),
            index: config.index,
        })
    }

    fn record_to_doc(record: &IndexedRecord) -> Value {
        json!({
            "chunk_id": record.chunk_id,
            "doc_id": record.doc_id,
            "page_num": record.page_num,
            "text_content_hi": record.text_content_hi,
            "text_content_gu": record.text_content_gu,
            "text_content_en": record.text_content_en,
            "vector_embedding": record.vector_embedding,
            "categories": record.categories,
            "bookmarks": record.bookmarks,
            "original_filename": record.original_filename,
            "seq_num": record.seq_num,
        })
    }
}

#[async_trait]
impl Indexer for OpenSearchIndexer {
    async fn index_chunks(&self, doc_id: &str, records: &[IndexedRecord]) -> IndexResult<()> {
        self.delete_doc(doc_id).await?;
        if records.is_empty() {
            return Ok(());
        }

        let mut body: Vec<Value> = Vec::with_capacity(records.len() * 2);
        for record in records {
            body.push(json!({ "index": { "_index": self.index, "_id": record.chunk_id } }));
            body.push(Self::record_to_doc(record));
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::Cluster(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let items = payload["items"].as_array().cloned().unwrap_or_default();
        let failed = items
            .iter()
            .filter(|item| {
                item.get("index")
                    .and_then(|i| i.get("error"))
                    .is_some()
            })
            .count();
        if failed > 0 {
            warn!(doc_id, failed, total = items.len(), "bulk index had partial failures");
            return Err(IndexError::PartialBulkFailure {
                failed,
                total: items.len(),
            });
        }

        info!(doc_id, count = records.len(), "indexed chunks");
        Ok(())
    }

    async fn update_metadata(
        &self,
        doc_id: &str,
        categories: &BTreeMap<String, Vec<String>>,
        bookmarks: &[String],
    ) -> IndexResult<()> {
        let chunk_ids = self.list_chunk_ids_for_doc(doc_id).await?;
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let mut body: Vec<Value> = Vec::with_capacity(chunk_ids.len() * 2);
        for chunk_id in &chunk_ids {
            body.push(json!({ "update": { "_index": self.index, "_id": chunk_id } }));
            body.push(json!({ "doc": { "categories": categories, "bookmarks": bookmarks } }));
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::Cluster(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        let items = payload["items"].as_array().cloned().unwrap_or_default();
        let failed = items
            .iter()
            .filter(|item| item.get("update").and_then(|i| i.get("error")).is_some())
            .count();
        if failed > 0 {
            return Err(IndexError::PartialBulkFailure {
                failed,
                total: items.len(),
            });
        }

        info!(doc_id, count = chunk_ids.len(), "updated metadata");
        Ok(())
    }

    async fn delete_doc(&self, doc_id: &str) -> IndexResult<()> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[&self.index]))
            .body(json!({ "query": { "term": { "doc_id": doc_id } } }))
            .send()
            .await
            .map_err(|e| IndexError::Cluster(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(IndexError::Cluster(format!(
                "delete_by_query returned {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn list_doc_ids(&self) -> IndexResult<Vec<String>> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(json!({
                "size": 0,
                "aggs": { "doc_ids": { "terms": { "field": "doc_id", "size": 10_000 } } }
            }))
            .send()
            .await
            .map_err(|e| IndexError::Cluster(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let buckets = payload["aggregations"]["doc_ids"]["buckets"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(buckets
            .into_iter()
            .filter_map(|b| b["key"].as_str().map(str::to_string))
            .collect())
    }
}

impl OpenSearchIndexer {
    async fn list_chunk_ids_for_doc(&self, doc_id: &str) -> IndexResult<Vec<String>> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(json!({
                "size": 10_000,
                "_source": false,
                "query": { "term": { "doc_id": doc_id } }
            }))
            .send()
            .await
            .map_err(|e| IndexError::Cluster(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let hits = payload["hits"]["hits"].as_array().cloned().unwrap_or_default();
        Ok(hits
            .into_iter()
            .filter_map(|h| h["_id"].as_str().map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexer_config_default_reads_env_or_falls_back() {
        let config = IndexerConfig::default();
        assert!(!config.index.is_empty());
        assert!(config.url.starts_with("http"));
    }

    #[test]
    fn record_to_doc_carries_all_fields() {
        let record = IndexedRecord {
            chunk_id: "c1".into(),
            doc_id: "d1".into(),
            page_num: 1,
            text_content_hi: "नमस्ते".into(),
            text_content_gu: String::new(),
            text_content_en: String::new(),
            vector_embedding: vec![0.1, 0.2],
            categories: BTreeMap::new(),
            bookmarks: vec!["chapter 1".into()],
            original_filename: "f.pdf".into(),
            seq_num: 0,
        };
        let doc = OpenSearchIndexer::record_to_doc(&record);
        assert_eq!(doc["chunk_id"], "c1");
        assert_eq!(doc["text_content_hi"], "नमस्ते");
        assert_eq!(doc["bookmarks"][0], "chapter 1");
    }
}

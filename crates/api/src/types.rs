//! HTTP request and response bodies for the catalogue API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_page_size() -> usize {
    20
}

fn default_page_number() -> usize {
    1
}

fn default_proximity_distance() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchTypeBody {
    #[default]
    Speed,
    Relevance,
}

/// Body of `POST /search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequestBody {
    pub keywords: String,
    #[serde(default = "default_proximity_distance")]
    pub proximity_distance: u32,
    #[serde(default)]
    pub exact_match: bool,
    #[serde(default)]
    pub exclude_words: Vec<String>,
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub content_types: Vec<String>,
    pub bookmark: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_number")]
    pub page_number: usize,
    #[serde(default)]
    pub search_type: SearchTypeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHitBody {
    pub chunk_id: String,
    pub doc_id: String,
    pub page_number: u32,
    pub content_snippet: String,
    pub score: f32,
    pub original_filename: String,
    pub metadata: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultBucketBody {
    pub total_hits: u64,
    pub page_size: usize,
    pub page_number: usize,
    pub results: Vec<SearchHitBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponseBody {
    pub pravachan_results: ResultBucketBody,
    pub granth_results: ResultBucketBody,
    pub suggestions: Vec<String>,
    pub highlight_words: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextResponseBody {
    pub previous: Option<SearchHitBody>,
    pub current: SearchHitBody,
    pub next: Option<SearchHitBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataQuery {
    #[serde(default)]
    pub categories: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataResponseBody {
    pub categories: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanResponseQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResponseBody {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

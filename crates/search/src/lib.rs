//! Query Planner + Hybrid Searcher: turns a `SearchRequest` into lexical and
//! vector cluster queries, runs them concurrently, and fuses the results.
//!
//! Grounded in the teacher's `fusion` crate: a pure combinator
//! (`fuse(...) -> Timeline`) with its own config/error types, run over two
//! upstream branches. Here the branches are lexical and vector search rather
//! than cross-modal tracks, and the combinator is Reciprocal Rank Fusion
//! instead of temporal alignment, but the shape — a dedicated crate owning
//! just the combine step, fed by two independently-fallible sources joined
//! with `tokio::join!` — is the same.

use async_trait::async_trait;
use catalogue_embeddings::EmbeddingAdapter;
use opensearch::http::transport::Transport;
use opensearch::{OpenSearch, SearchParts};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

const RRF_K: f32 = 60.0;
const RERANK_TOP_M: usize = 50;
const DEVANAGARI_RANGE: (u32, u32) = (0x0900, 0x097F);
const GUJARATI_RANGE: (u32, u32) = (0x0A80, 0x0AFF);

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search cluster error: {0}")]
    Cluster(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("both lexical and vector branches failed: lexical={lexical}, vector={vector}")]
    BothBranchesFailed { lexical: String, vector: String },

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Speed,
    Relevance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedLanguage {
    Hindi,
    Gujarati,
    English,
}

impl DetectedLanguage {
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            DetectedLanguage::Hindi => "text_content_hi",
            DetectedLanguage::Gujarati => "text_content_gu",
            DetectedLanguage::English => "text_content_en",
        }
    }
}

/// Heuristic majority-vote over Unicode code-point ranges, falling back to
/// `whatlang` when neither Devanagari nor Gujarati dominates.
#[must_use]
pub fn detect_language(text: &str) -> DetectedLanguage {
    let mut devanagari = 0usize;
    let mut gujarati = 0usize;
    let mut letters = 0usize;

    for ch in text.chars() {
        let cp = ch as u32;
        if ch.is_alphabetic() {
            letters += 1;
        }
        if (DEVANAGARI_RANGE.0..=DEVANAGARI_RANGE.1).contains(&cp) {
            devanagari += 1;
        } else if (GUJARATI_RANGE.0..=GUJARATI_RANGE.1).contains(&cp) {
            gujarati += 1;
        }
    }

    if letters == 0 {
        return DetectedLanguage::English;
    }
    if devanagari * 2 > letters {
        return DetectedLanguage::Hindi;
    }
    if gujarati * 2 > letters {
        return DetectedLanguage::Gujarati;
    }

    match whatlang::detect(text) {
        Some(info) if info.lang() == whatlang::Lang::Hin => DetectedLanguage::Hindi,
        Some(info) if info.lang() == whatlang::Lang::Guj => DetectedLanguage::Gujarati,
        _ => DetectedLanguage::English,
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keywords: String,
    pub proximity_distance: u32,
    pub exact_match: bool,
    pub exclude_words: Vec<String>,
    pub categories: BTreeMap<String, Vec<String>>,
    pub content_types: Vec<String>,
    pub bookmark: Option<String>,
    pub page_size: usize,
    pub page_number: usize,
    pub search_type: SearchType,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            proximity_distance: 5,
            exact_match: false,
            exclude_words: Vec::new(),
            categories: BTreeMap::new(),
            content_types: vec!["pravachan".to_string(), "granth".to_string()],
            bookmark: None,
            page_size: 20,
            page_number: 1,
            search_type: SearchType::Speed,
        }
    }
}

/// Builds the lexical and vector query DSL bodies for a `SearchRequest`; a
/// pure function of the request and the detected language, same division of
/// responsibility as the teacher's `ResolvedConfig`-driven builders.
pub struct QueryPlanner;

impl QueryPlanner {
    #[must_use]
    pub fn build_filter(request: &SearchRequest) -> Vec<Value> {
        let mut filters = Vec::new();

        for (category, values) in &request.categories {
            filters.push(json!({ "terms": { format!("categories.{category}"): values } }));
        }

        if !request.content_types.is_empty() {
            filters.push(json!({ "terms": { "categories.content_type": request.content_types } }));
        }

        if let Some(bookmark) = &request.bookmark {
            filters.push(json!({ "match": { "bookmarks": bookmark } }));
        }

        filters
    }

    /// Both branches are fetched `from: 0` with `size: candidate_size`, a pool
    /// large enough to cover every rank RRF fusion needs to reproduce the
    /// combined list through the requested page. Pagination is applied
    /// exactly once, after fusion, in `HybridSearcher::search`.
    #[must_use]
    pub fn build_lexical_body(
        request: &SearchRequest,
        language: DetectedLanguage,
        candidate_size: usize,
    ) -> Value {
        let field = language.field_name();
        let slop = if request.exact_match { 0 } else { request.proximity_distance };

        let mut must_not: Vec<Value> = Vec::new();
        for word in &request.exclude_words {
            must_not.push(json!({ "match": { field: word } }));
        }

        json!({
            "from": 0,
            "size": candidate_size,
            "query": {
                "bool": {
                    "must": [
                        { "match_phrase": { field: { "query": request.keywords, "slop": slop } } }
                    ],
                    "must_not": must_not,
                    "filter": Self::build_filter(request),
                }
            },
            "highlight": { "fields": { field: {} } }
        })
    }

    #[must_use]
    pub fn build_vector_body(request: &SearchRequest, vector: &[f32], candidate_size: usize) -> Value {
        json!({
            "from": 0,
            "size": candidate_size,
            "knn": {
                "field": "vector_embedding",
                "query_vector": vector,
                "k": candidate_size,
                "num_candidates": candidate_size * 4,
                "filter": { "bool": { "filter": Self::build_filter(request) } }
            }
        })
    }
}

/// External cross-encoder contract for the optional `search_type=relevance`
/// rerank pass. The model itself is out of scope; only the contract is
/// specified.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, docs: &[String]) -> Result<Vec<f32>, SearchError>;
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub doc_id: String,
    pub page_number: u32,
    pub content_snippet: String,
    pub score: f32,
    pub original_filename: String,
    pub metadata: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultBucket {
    pub total_hits: u64,
    pub page_size: usize,
    pub page_number: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub pravachan_results: ResultBucket,
    pub granth_results: ResultBucket,
    pub suggestions: Vec<String>,
    pub highlight_words: Vec<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct ContextResult {
    pub previous: Option<SearchHit>,
    pub current: SearchHit,
    pub next: Option<SearchHit>,
}

pub type MetadataAggregation = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub url: String,
    pub index: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("CATALOGUE_SEARCH_URL")
                .unwrap_or_else(|_| "https://localhost:9200".to_string()),
            index: std::env::var("CATALOGUE_SEARCH_INDEX")
                .unwrap_or_else(|_| "catalogue_chunks".to_string()),
        }
    }
}

/// Executes the lexical and vector branches in parallel, fuses with RRF,
/// dedupes, paginates, optionally reranks, and extracts highlight words.
pub struct HybridSearcher {
    client: OpenSearch,
    index: String,
    embeddings: Arc<EmbeddingAdapter>,
    reranker: Option<Arc<dyn Reranker>>,
}

struct RankedHit {
    chunk_id: String,
    source: Value,
    highlight: Option<String>,
}

impl HybridSearcher {
    pub fn new(
        config: SearchConfig,
        embeddings: Arc<EmbeddingAdapter>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Result<Self, SearchError> {
        let transport =
            Transport::single_node(&config.url).map_err(|e| SearchError::Cluster(e.to_string()))?;
        Ok(Self {
            client: OpenSearch::new(transport),
            index: config.index,
            embeddings,
            reranker,
        })
    }

    async fn run_query(&self, body: Value) -> Result<Vec<RankedHit>, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::Cluster(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Serialization(e.to_string()))?;

        let hits = payload["hits"]["hits"].as_array().cloned().unwrap_or_default();
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let chunk_id = hit["_id"].as_str()?.to_string();
                let source = hit["_source"].clone();
                let highlight = hit["highlight"]
                    .as_object()
                    .and_then(|h| h.values().next())
                    .and_then(|v| v.as_array())
                    .and_then(|a| a.first())
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                Some(RankedHit {
                    chunk_id,
                    source,
                    highlight,
                })
            })
            .collect())
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let language = detect_language(&request.keywords);
        let query_vector = self
            .embeddings
            .embed(&request.keywords)
            .await
            .map_err(|e| SearchError::Embedding(e.to_string()))?;

        let from = (request.page_number.saturating_sub(1)) * request.page_size;
        // Candidate pool must reach through the last rank of the requested page
        // on each branch, or RRF fusion would be missing ranks it needs to
        // reproduce the correct combined order for that page.
        let candidate_size = (from + request.page_size).max(RERANK_TOP_M);
        let lexical_body = QueryPlanner::build_lexical_body(request, language, candidate_size);
        let vector_body = QueryPlanner::build_vector_body(request, &query_vector, candidate_size);

        let (lexical_result, vector_result) =
            tokio::join!(self.run_query(lexical_body), self.run_query(vector_body));

        let mut degraded = false;
        let (lexical, vector) = match (lexical_result, vector_result) {
            (Ok(l), Ok(v)) => (l, v),
            (Ok(l), Err(e)) => {
                warn!(error = %e, "vector branch failed, degrading to lexical-only");
                degraded = true;
                (l, Vec::new())
            }
            (Err(e), Ok(v)) => {
                warn!(error = %e, "lexical branch failed, degrading to vector-only");
                degraded = true;
                (Vec::new(), v)
            }
            (Err(le), Err(ve)) => {
                return Err(SearchError::BothBranchesFailed {
                    lexical: le.to_string(),
                    vector: ve.to_string(),
                })
            }
        };

        let mut fused = rrf_fuse(&lexical, &vector);

        if request.search_type == SearchType::Relevance {
            if let Some(reranker) = &self.reranker {
                let top: Vec<_> = fused.iter().take(RERANK_TOP_M).cloned().collect();
                let docs: Vec<String> = top
                    .iter()
                    .map(|f| f.source["text_content_hi"].as_str().unwrap_or("").to_string())
                    .collect();
                match reranker.rerank(&request.keywords, &docs).await {
                    Ok(scores) => {
                        let mut rescored: Vec<(FusedHit, f32)> =
                            top.into_iter().zip(scores.into_iter()).collect();
                        rescored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                        let mut rest: Vec<FusedHit> = fused.into_iter().skip(RERANK_TOP_M).collect();
                        fused = rescored.into_iter().map(|(f, score)| FusedHit { score, ..f }).collect();
                        fused.append(&mut rest);
                    }
                    Err(e) => warn!(error = %e, "rerank failed, keeping RRF order"),
                }
            }
        }

        let total_hits = fused.len() as u64;
        let page_slice: Vec<FusedHit> = fused
            .into_iter()
            .skip(from)
            .take(request.page_size)
            .collect();

        let mut highlight_words: BTreeSet<String> = request
            .keywords
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let em_re = Regex::new(r"<em>(.*?)</em>").expect("static pattern");

        let mut pravachan_hits = Vec::new();
        let mut granth_hits = Vec::new();

        for fused_hit in &page_slice {
            if let Some(fragment) = &fused_hit.highlight {
                for cap in em_re.captures_iter(fragment) {
                    for word in cap[1].split_whitespace() {
                        highlight_words.insert(word.to_lowercase());
                    }
                }
            }
            let hit = to_search_hit(fused_hit);
            let is_granth = hit
                .metadata
                .get("content_type")
                .is_some_and(|v| v.iter().any(|t| t == "granth"));
            if is_granth {
                granth_hits.push(hit);
            } else {
                pravachan_hits.push(hit);
            }
        }

        let suggestions = if total_hits == 0 {
            vec!["Try removing exclude filters or broadening category filters.".to_string()]
        } else {
            Vec::new()
        };

        Ok(SearchResponse {
            pravachan_results: ResultBucket {
                total_hits,
                page_size: request.page_size,
                page_number: request.page_number,
                results: pravachan_hits,
            },
            granth_results: ResultBucket {
                total_hits,
                page_size: request.page_size,
                page_number: request.page_number,
                results: granth_hits,
            },
            suggestions,
            highlight_words: highlight_words.into_iter().collect(),
            degraded,
        })
    }

    /// Vector-only k-NN around `chunk_id`'s own embedding, excluding chunks
    /// from the same document.
    pub async fn similar_documents(&self, chunk_id: &str, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        let source = self.fetch_source(chunk_id).await?;
        let vector = source["vector_embedding"]
            .as_array()
            .ok_or_else(|| SearchError::NotFound(chunk_id.to_string()))?
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect::<Vec<f32>>();
        let doc_id = source["doc_id"].as_str().unwrap_or_default();

        let body = json!({
            "size": top_k,
            "knn": {
                "field": "vector_embedding",
                "query_vector": vector,
                "k": top_k,
                "num_candidates": top_k * 4,
                "filter": { "bool": { "must_not": [{ "term": { "doc_id": doc_id } }] } }
            }
        });

        let hits = self.run_query(body).await?;
        Ok(hits
            .into_iter()
            .map(|h| {
                to_search_hit(&FusedHit {
                    chunk_id: h.chunk_id,
                    source: h.source,
                    highlight: None,
                    score: 0.0,
                    lexical_rank: None,
                })
            })
            .collect())
    }

    /// `{previous, current, next}` paragraphs by `seq_num ± 1` in the same doc.
    pub async fn context(&self, chunk_id: &str) -> Result<ContextResult, SearchError> {
        let source = self.fetch_source(chunk_id).await?;
        let doc_id = source["doc_id"].as_str().unwrap_or_default().to_string();
        let seq_num = source["seq_num"].as_u64().unwrap_or(0);

        let body = json!({
            "size": 3,
            "query": {
                "bool": {
                    "filter": [
                        { "term": { "doc_id": doc_id } },
                        { "range": { "seq_num": { "gte": seq_num.saturating_sub(1), "lte": seq_num + 1 } } }
                    ]
                }
            },
            "sort": [{ "seq_num": "asc" }]
        });

        let hits = self.run_query(body).await?;
        let mut by_seq: BTreeMap<u64, SearchHit> = BTreeMap::new();
        for hit in &hits {
            let hit_seq = hit.source["seq_num"].as_u64().unwrap_or(0);
            by_seq.insert(
                hit_seq,
                to_search_hit(&FusedHit {
                    chunk_id: hit.chunk_id.clone(),
                    source: hit.source.clone(),
                    highlight: None,
                    score: 0.0,
                    lexical_rank: None,
                }),
            );
        }

        let current = by_seq
            .remove(&seq_num)
            .ok_or_else(|| SearchError::NotFound(chunk_id.to_string()))?;
        Ok(ContextResult {
            previous: by_seq.remove(&seq_num.saturating_sub(1)),
            current,
            next: by_seq.remove(&(seq_num + 1)),
        })
    }

    /// Aggregated distinct values per category, for filter UI population.
    pub async fn metadata_aggregation(&self, categories: &[String]) -> Result<MetadataAggregation, SearchError> {
        let mut aggs = serde_json::Map::new();
        for category in categories {
            aggs.insert(
                category.clone(),
                json!({ "terms": { "field": format!("categories.{category}"), "size": 1000 } }),
            );
        }

        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(json!({ "size": 0, "aggs": aggs }))
            .send()
            .await
            .map_err(|e| SearchError::Cluster(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Serialization(e.to_string()))?;

        let mut out = MetadataAggregation::new();
        for category in categories {
            let buckets = payload["aggregations"][category]["buckets"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            let values = buckets
                .into_iter()
                .filter_map(|b| b["key"].as_str().map(str::to_string))
                .collect();
            out.insert(category.clone(), values);
        }
        Ok(out)
    }

    async fn fetch_source(&self, chunk_id: &str) -> Result<Value, SearchError> {
        let body = json!({ "size": 1, "query": { "term": { "_id": chunk_id } } });
        let hits = self.run_query(body).await?;
        hits.into_iter()
            .next()
            .map(|h| h.source)
            .ok_or_else(|| SearchError::NotFound(chunk_id.to_string()))
    }
}

#[derive(Debug, Clone)]
struct FusedHit {
    chunk_id: String,
    source: Value,
    highlight: Option<String>,
    score: f32,
    lexical_rank: Option<usize>,
}

/// Reciprocal Rank Fusion: each list contributes `1/(k+r)` at 1-indexed rank
/// `r`; scores summed across lists; ties broken by lexical rank.
fn rrf_fuse(lexical: &[RankedHit], vector: &[RankedHit]) -> Vec<FusedHit> {
    let mut scores: BTreeMap<String, (f32, Option<usize>, Value, Option<String>)> = BTreeMap::new();

    for (rank, hit) in lexical.iter().enumerate() {
        let entry = scores
            .entry(hit.chunk_id.clone())
            .or_insert((0.0, None, hit.source.clone(), hit.highlight.clone()));
        entry.0 += 1.0 / (RRF_K + (rank + 1) as f32);
        entry.1 = Some(rank + 1);
        if entry.3.is_none() {
            entry.3 = hit.highlight.clone();
        }
    }
    for (rank, hit) in vector.iter().enumerate() {
        let entry = scores
            .entry(hit.chunk_id.clone())
            .or_insert((0.0, None, hit.source.clone(), hit.highlight.clone()));
        entry.0 += 1.0 / (RRF_K + (rank + 1) as f32);
    }

    let mut fused: Vec<FusedHit> = scores
        .into_iter()
        .map(|(chunk_id, (score, lexical_rank, source, highlight))| FusedHit {
            chunk_id,
            source,
            highlight,
            score,
            lexical_rank,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.lexical_rank
                    .unwrap_or(usize::MAX)
                    .cmp(&b.lexical_rank.unwrap_or(usize::MAX))
            })
    });
    fused
}

fn to_search_hit(fused: &FusedHit) -> SearchHit {
    let source = &fused.source;
    let metadata: BTreeMap<String, Vec<String>> = source["categories"]
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let values = v
                        .as_array()
                        .map(|a| a.iter().filter_map(|x| x.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    (k.clone(), values)
                })
                .collect()
        })
        .unwrap_or_default();

    let snippet = fused
        .highlight
        .clone()
        .unwrap_or_else(|| {
            ["text_content_hi", "text_content_gu", "text_content_en"]
                .iter()
                .find_map(|field| source[*field].as_str())
                .map(|s| s.chars().take(240).collect())
                .unwrap_or_default()
        });

    SearchHit {
        chunk_id: fused.chunk_id.clone(),
        doc_id: source["doc_id"].as_str().unwrap_or_default().to_string(),
        page_number: source["page_num"].as_u64().unwrap_or(0) as u32,
        content_snippet: snippet,
        score: fused.score,
        original_filename: source["original_filename"].as_str().unwrap_or_default().to_string(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_hindi_majority() {
        assert_eq!(detect_language("सम्यग्दर्शन होते ही जीव"), DetectedLanguage::Hindi);
    }

    #[test]
    fn detect_language_gujarati_majority() {
        assert_eq!(detect_language("આત્મા એ શાશ્વત દ્રવ્ય છે"), DetectedLanguage::Gujarati);
    }

    #[test]
    fn detect_language_english_fallback() {
        assert_eq!(detect_language("what is the nature of the soul"), DetectedLanguage::English);
    }

    #[test]
    fn lexical_body_uses_slop_zero_for_exact_match() {
        let request = SearchRequest {
            keywords: "soul nature".to_string(),
            exact_match: true,
            ..SearchRequest::default()
        };
        let body = QueryPlanner::build_lexical_body(&request, DetectedLanguage::English, 0);
        assert_eq!(body["query"]["bool"]["must"][0]["match_phrase"]["text_content_en"]["slop"], 0);
    }

    #[test]
    fn lexical_body_default_slop_is_proximity_distance() {
        let request = SearchRequest::default();
        let body = QueryPlanner::build_lexical_body(&request, DetectedLanguage::English, 0);
        assert_eq!(
            body["query"]["bool"]["must"][0]["match_phrase"]["text_content_en"]["slop"],
            5
        );
    }

    #[test]
    fn category_filter_is_terms_clause_per_category() {
        let mut request = SearchRequest::default();
        request.categories.insert("author".to_string(), vec!["X".to_string(), "Y".to_string()]);
        let filters = QueryPlanner::build_filter(&request);
        assert!(filters
            .iter()
            .any(|f| f["terms"].get("categories.author").is_some()));
    }

    #[test]
    fn rrf_fuse_sums_reciprocal_ranks_across_lists() {
        let lexical = vec![RankedHit {
            chunk_id: "c1".to_string(),
            source: json!({ "doc_id": "d1" }),
            highlight: None,
        }];
        let vector = vec![RankedHit {
            chunk_id: "c1".to_string(),
            source: json!({ "doc_id": "d1" }),
            highlight: None,
        }];
        let fused = rrf_fuse(&lexical, &vector);
        assert_eq!(fused.len(), 1);
        let expected = 1.0 / (RRF_K + 1.0) + 1.0 / (RRF_K + 1.0);
        assert!((fused[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn rrf_fuse_dedupes_keeping_summed_score() {
        let lexical = vec![
            RankedHit { chunk_id: "a".to_string(), source: json!({}), highlight: None },
            RankedHit { chunk_id: "b".to_string(), source: json!({}), highlight: None },
        ];
        let vector = vec![
            RankedHit { chunk_id: "b".to_string(), source: json!({}), highlight: None },
            RankedHit { chunk_id: "a".to_string(), source: json!({}), highlight: None },
        ];
        let fused = rrf_fuse(&lexical, &vector);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn to_search_hit_splits_content_type_for_bucketing() {
        let fused = FusedHit {
            chunk_id: "c1".to_string(),
            source: json!({
                "doc_id": "d1",
                "page_num": 3,
                "original_filename": "book.pdf",
                "text_content_hi": "कुछ पाठ",
                "categories": { "content_type": ["granth"] }
            }),
            highlight: None,
            score: 1.0,
            lexical_rank: Some(1),
        };
        let hit = to_search_hit(&fused);
        assert_eq!(hit.metadata["content_type"], vec!["granth".to_string()]);
        assert_eq!(hit.page_number, 3);
    }
}

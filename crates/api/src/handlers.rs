//! HTTP request handlers for the catalogue search API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use catalogue_search_engine::{SearchHit, SearchRequest, SearchType};
use tracing::{error, info};

use crate::types::{
    ContextResponseBody, HealthResponse, MetadataQuery, MetadataResponseBody, ResultBucketBody,
    ScanResponseBody, ScanResponseQuery, SearchHitBody, SearchRequestBody, SearchResponseBody,
    SearchTypeBody,
};
use crate::ApiState;

fn map_hit(hit: SearchHit) -> SearchHitBody {
    SearchHitBody {
        chunk_id: hit.chunk_id,
        doc_id: hit.doc_id,
        page_number: hit.page_number,
        content_snippet: hit.content_snippet,
        score: hit.score,
        original_filename: hit.original_filename,
        metadata: hit.metadata,
    }
}

fn map_bucket(bucket: catalogue_search_engine::ResultBucket) -> ResultBucketBody {
    ResultBucketBody {
        total_hits: bucket.total_hits,
        page_size: bucket.page_size,
        page_number: bucket.page_number,
        results: bucket.results.into_iter().map(map_hit).collect(),
    }
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> (StatusCode, String) {
    error!(error = %err, context, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {err}"))
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn search(
    State(state): State<ApiState>,
    Json(body): Json<SearchRequestBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = SearchRequest {
        keywords: body.keywords,
        proximity_distance: body.proximity_distance,
        exact_match: body.exact_match,
        exclude_words: body.exclude_words,
        categories: body.categories,
        content_types: if body.content_types.is_empty() {
            vec!["pravachan".to_string(), "granth".to_string()]
        } else {
            body.content_types
        },
        bookmark: body.bookmark,
        page_size: body.page_size,
        page_number: body.page_number,
        search_type: match body.search_type {
            SearchTypeBody::Speed => SearchType::Speed,
            SearchTypeBody::Relevance => SearchType::Relevance,
        },
    };

    let response = state
        .searcher
        .search(&request)
        .await
        .map_err(|e| internal_error("search failed", e))?;

    Ok(Json(SearchResponseBody {
        pravachan_results: map_bucket(response.pravachan_results),
        granth_results: map_bucket(response.granth_results),
        suggestions: response.suggestions,
        highlight_words: response.highlight_words,
        degraded: response.degraded,
    }))
}

pub async fn similar_documents(
    State(state): State<ApiState>,
    Path(chunk_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let hits = state
        .searcher
        .similar_documents(&chunk_id, 10)
        .await
        .map_err(|e| internal_error("similar documents lookup failed", e))?;
    Ok(Json(hits.into_iter().map(map_hit).collect::<Vec<_>>()))
}

pub async fn context(
    State(state): State<ApiState>,
    Path(chunk_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = state
        .searcher
        .context(&chunk_id)
        .await
        .map_err(|e| internal_error("context lookup failed", e))?;
    Ok(Json(ContextResponseBody {
        previous: result.previous.map(map_hit),
        current: map_hit(result.current),
        next: result.next.map(map_hit),
    }))
}

pub async fn metadata(
    State(state): State<ApiState>,
    Query(query): Query<MetadataQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let categories: Vec<String> = query
        .categories
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let aggregation = state
        .searcher
        .metadata_aggregation(&categories)
        .await
        .map_err(|e| internal_error("metadata aggregation failed", e))?;
    Ok(Json(MetadataResponseBody {
        categories: aggregation,
    }))
}

/// Triggers a corpus scan. With `?wait=true` the request blocks until the
/// scan completes and returns its tallies; otherwise it is spawned in the
/// background and `202 Accepted` is returned immediately.
pub async fn scan(
    State(state): State<ApiState>,
    Query(query): Query<ScanResponseQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if query.wait {
        let plan = state
            .discovery
            .scan()
            .await
            .map_err(|e| internal_error("scan failed", e))?;
        return Ok((
            StatusCode::OK,
            Json(ScanResponseBody {
                total: plan.items.len(),
                completed: plan.completed_count(),
                failed: plan.failed_count(),
            }),
        ));
    }

    let discovery = state.discovery.clone();
    tokio::spawn(async move {
        match discovery.scan().await {
            Ok(plan) => info!(
                total = plan.items.len(),
                completed = plan.completed_count(),
                failed = plan.failed_count(),
                "background scan finished"
            ),
            Err(e) => error!(error = %e, "background scan failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanResponseBody {
            total: 0,
            completed: 0,
            failed: 0,
        }),
    ))
}

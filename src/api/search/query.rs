use axum::{
    extract::{Query, State},
    Json,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use abe_portal_backend::search::{generate_snippet, SearchHit};

use crate::api::ApiResponse;
use crate::state::AppState;
use super::types::*;

/// 并发补全文档元数据的数量
const ENRICH_CONCURRENCY: usize = 8;

/// GET /api/search - 搜索文档
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<ApiResponse<SearchResponse>> {
    let limit = state.config.search.clamp_limit(params.limit);
    Json(ApiResponse::success(run_search(&state, &params.q, limit).await))
}

/// Search plus Paperless metadata; hits the remote cannot resolve are dropped / 搜索并补全元数据
pub async fn run_search(state: &AppState, q: &str, limit: usize) -> SearchResponse {
    let query = q.trim();
    if query.is_empty() {
        return SearchResponse {
            results: Vec::new(),
            total: 0,
            query: String::new(),
            enumbers_found: Vec::new(),
            degraded: false,
        };
    }

    let outcome = state.search.query(query, limit).await;
    let results: Vec<SearchResultItem> = stream::iter(outcome.hits)
        .map(|hit| enrich(state, hit, query))
        .buffered(ENRICH_CONCURRENCY)
        .filter_map(|item| async move { item })
        .collect()
        .await;

    SearchResponse {
        total: results.len(),
        results,
        query: query.to_string(),
        enumbers_found: outcome.enumbers_found,
        degraded: outcome.degraded,
    }
}

async fn enrich(state: &AppState, hit: SearchHit, query: &str) -> Option<SearchResultItem> {
    let doc = match state.documents.get_document(&hit.doc_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            tracing::debug!("Document {} no longer exists in Paperless", hit.doc_id);
            return None;
        }
        Err(e) => {
            tracing::debug!("Failed to enrich search hit {}: {}", hit.doc_id, e);
            return None;
        }
    };

    let snippet = doc
        .content
        .as_deref()
        .and_then(|content| generate_snippet(content, query, state.config.search.snippet_length));

    Some(SearchResultItem {
        doc_id: hit.doc_id,
        title: hit.title,
        enumbers: hit.enumbers,
        score: hit.score,
        created: doc.created.unwrap_or_default(),
        modified: doc.modified.unwrap_or_default(),
        snippet,
    })
}

/// GET /api/search/suggest - 搜索联想
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<ApiResponse<SuggestResponse>> {
    let limit = state.config.search.clamp_suggestions(params.limit);
    let suggestions = state.search.suggest(&params.q, limit).await;
    Json(ApiResponse::success(SuggestResponse { suggestions }))
}

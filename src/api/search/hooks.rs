use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::state::AppState;
use super::query::run_search;
use super::types::*;

/// POST /api/hooks/search - 外部自动化调用的搜索
pub async fn hook_search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HookSearchRequest>,
) -> Json<ApiResponse<HookSearchResponse>> {
    let query = req.combined_query();
    let limit = state.config.search.clamp_limit(Some(req.limit));
    let response = run_search(&state, &query, limit).await;

    let results: Vec<HookSearchResult> = response
        .results
        .into_iter()
        .map(|item| HookSearchResult {
            download_url: format!("/api/docs/{}/download", item.doc_id),
            doc_id: item.doc_id,
            title: item.title,
            snippet: item.snippet,
            enumbers: item.enumbers,
        })
        .collect();

    Json(ApiResponse::success(HookSearchResponse {
        total: results.len(),
        results,
        query: response.query,
    }))
}

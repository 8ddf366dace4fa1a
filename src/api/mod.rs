pub mod search;
pub mod server;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            code: 400,
            message: message.to_string(),
            data: None,
        }
    }
}

/// API routes / API路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(server::health_check))
        .route("/api/status", get(server::get_server_status))
        .route("/api/paperless/status", get(server::get_paperless_status))
        // 搜索API
        .route("/api/search", get(search::search))
        .route("/api/search/suggest", get(search::suggest))
        .route("/api/hooks/search", post(search::hook_search))
        // 索引同步API
        .route("/api/search/sync", post(search::trigger_sync))
        .route("/api/search/sync/status", get(search::sync_status))
        .route("/api/search/sync/stop", post(search::stop_sync))
        .route("/api/search/sync/:doc_id", post(search::sync_one))
        .with_state(state)
}

use axum::{
    extract::State,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;
use crate::api::ApiResponse;

/// GET /api/health - 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "ABE Portal 服务运行正常",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

/// 服务状态
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub database: String,
    pub indexed_documents: u64,
    pub sync_running: bool,
}

/// GET /api/status - 数据库连通性
pub async fn get_server_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<ServerStatus>> {
    if let Err(e) = state.db_index.ping().await {
        tracing::error!("Database ping failed: {}", e);
        return Json(ApiResponse::error(&format!("数据库不可用: {}", e)));
    }

    let stats = state.db_index.get_stats().await;
    Json(ApiResponse::success(ServerStatus {
        database: "connected".to_string(),
        indexed_documents: stats.document_count,
        sync_running: state.sync_state.is_running(),
    }))
}

/// Paperless连接状态
#[derive(Debug, Clone, Serialize)]
pub struct PaperlessStatus {
    pub connected: bool,
    pub base_url: String,
}

/// GET /api/paperless/status - 测试Paperless连接
pub async fn get_paperless_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<PaperlessStatus>> {
    let connected = state.documents.test_connection().await;
    Json(ApiResponse::success(PaperlessStatus {
        connected,
        base_url: state.config.paperless.base_url.clone(),
    }))
}

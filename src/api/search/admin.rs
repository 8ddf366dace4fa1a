use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use abe_portal_backend::search::{sync_all, sync_document, IndexRecord};

use crate::api::ApiResponse;
use crate::state::AppState;
use super::types::*;

/// POST /api/search/sync - 后台全量同步
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<()>> {
    if !state.sync_state.try_start() {
        return Json(ApiResponse::error("同步正在进行中"));
    }

    tracing::info!("开始同步搜索索引");
    let state_clone = state.clone();
    tokio::spawn(async move {
        let state = state_clone;
        let result = sync_all(
            &state.db_index,
            state.documents.as_ref(),
            &state.codec,
            state.config.paperless.sync_page_size,
            &state.sync_state,
        )
        .await;

        match result {
            Ok(report) => {
                if let Err(e) = state.db_index.set_last_updated().await {
                    tracing::warn!("Failed to save index update time: {}", e);
                }
                state.sync_state.finish(report.pruned, None);
            }
            Err(e) => {
                tracing::error!("Search index sync failed: {:#}", e);
                state.sync_state.finish(0, Some(e.to_string()));
            }
        }
    });

    Json(ApiResponse::success(()))
}

/// POST /api/search/sync/:doc_id - 同步单个文档
pub async fn sync_one(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Json<ApiResponse<Option<IndexRecord>>> {
    match sync_document(&state.db_index, state.documents.as_ref(), &state.codec, &doc_id).await {
        Ok(record) => Json(ApiResponse::success(record)),
        Err(e) => {
            tracing::error!("Failed to sync document {}: {:#}", doc_id, e);
            Json(ApiResponse::error(&format!("同步失败: {}", e)))
        }
    }
}

/// POST /api/search/sync/stop - 停止同步
pub async fn stop_sync(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<()>> {
    if !state.sync_state.is_running() {
        return Json(ApiResponse::error("没有正在进行的同步"));
    }
    state.sync_state.cancel();
    Json(ApiResponse::success(()))
}

/// GET /api/search/sync/status - 同步状态
pub async fn sync_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<SyncStatus>> {
    let progress = state.sync_state.get_progress();
    let index = state.db_index.get_stats().await;

    let status = if progress.is_running {
        "syncing"
    } else if progress.error.is_some() {
        "error"
    } else if index.last_updated.is_none() {
        "not_built"
    } else {
        "idle"
    };

    Json(ApiResponse::success(SyncStatus {
        status: status.to_string(),
        progress,
        index,
    }))
}

use serde::{Deserialize, Serialize};

use abe_portal_backend::search::{IndexStats, SyncProgress};

/// 搜索参数
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

/// 搜索结果项
#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    pub doc_id: String,
    pub title: String,
    pub enumbers: Vec<String>,
    /// 降级查询时为空
    pub score: Option<f32>,
    pub created: String,
    pub modified: String,
    pub snippet: Option<String>,
}

/// 搜索响应
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub query: String,
    pub enumbers_found: Vec<String>,
    pub degraded: bool,
}

/// 联想响应
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

/// Automation hook request / 外部集成搜索请求
#[derive(Debug, Deserialize)]
pub struct HookSearchRequest {
    pub query: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "eNumber")]
    pub e_number: Option<String>,
    #[serde(default = "default_hook_limit")]
    pub limit: usize,
}

fn default_hook_limit() -> usize { 10 }

impl HookSearchRequest {
    /// Non-empty parts joined by spaces / 拼接查询
    pub fn combined_query(&self) -> String {
        [&self.query, &self.model, &self.e_number]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSearchResult {
    pub doc_id: String,
    pub title: String,
    pub snippet: Option<String>,
    pub download_url: String,
    pub enumbers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HookSearchResponse {
    pub results: Vec<HookSearchResult>,
    pub total: usize,
    pub query: String,
}

/// 同步状态
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub status: String,
    pub progress: SyncProgress,
    pub index: IndexStats,
}

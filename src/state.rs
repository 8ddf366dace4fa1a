use abe_portal_backend::config::AppConfig;
use abe_portal_backend::enumber::EnumberCodec;
use abe_portal_backend::paperless::DocumentStore;
use abe_portal_backend::search::{DbIndex, SearchIndex, SyncState};
use std::sync::Arc;

/// Shared application state / 应用共享状态
pub struct AppState {
    pub config: AppConfig,
    /// SQLite search helper store / 搜索辅助表
    pub db_index: DbIndex,
    /// Ranked search over `db_index` / 搜索引擎
    pub search: SearchIndex,
    /// Paperless-ngx, source of truth for documents / 远程文档存储
    pub documents: Arc<dyn DocumentStore>,
    pub codec: Arc<EnumberCodec>,
    pub sync_state: Arc<SyncState>,
}

impl AppState {
    pub fn new(config: AppConfig, db_index: DbIndex, documents: Arc<dyn DocumentStore>, codec: Arc<EnumberCodec>) -> Self {
        let search = SearchIndex::new(Arc::new(db_index.clone()), codec.clone())
            .with_tolerance(config.search.tolerance);
        Self {
            config,
            db_index,
            search,
            documents,
            codec,
            sync_state: Arc::new(SyncState::new()),
        }
    }
}

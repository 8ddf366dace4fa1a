//! Search module - E-number aware document search / 搜索模块
//!
//! Architecture principles / 架构原则：
//! - Index store only exposes primitive operations: get, upsert, scan, ...
//! - Engine owns ranking, sync owns the write path
//! - Call direction: API → Engine → Store (unidirectional) / 调用方向
//!
//! Index features / 索引特性：
//! - Database index: SQLite storage, whole records, JSON E-number column (recommended)
//! - Memory index: same contract, no persistence
//! - Tolerant E-number recognition plus accent-insensitive trigram title matching

pub mod db_index;
pub mod engine;
pub mod memory;
pub mod schema;
pub mod snippet;
pub mod sync;
pub mod tokenizer;

pub use db_index::{DbIndex, IndexError, IndexStats, IndexStore};
pub use engine::{QueryPlan, SearchIndex, DEFAULT_TOLERANCE};
pub use memory::MemoryIndex;
pub use schema::{IndexRecord, SearchHit, SearchOutcome};
pub use snippet::generate_snippet;
pub use sync::{build_record, sync_all, sync_document, SyncProgress, SyncReport, SyncState};

//! Database search index - SQLite backed index store / 数据库搜索索引
//!
//! 存储方案：
//! - search_helpers 表：每个远程文档一行，按 doc_id 覆盖写入
//! - enumbers 列以 JSON 数组保存规范化E号
//! - title_lower 列保存小写标题，用于降级子串匹配
//!
//! 特性：
//! - WAL 模式（读写并发）
//! - 写入遇到锁冲突时短暂重试

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use thiserror::Error;

use super::schema::IndexRecord;

/// Index store errors / 索引存储错误
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid enumber column: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("invalid timestamp {0} for document {1}")]
    Timestamp(i64, String),
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

/// Index statistics / 索引统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: u64,
    pub last_updated: Option<i64>,
}

/// Index store capability / 索引存储能力
///
/// Written by the sync process one record at a time (last writer wins per
/// `doc_id`), read by `SearchIndex`.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn get(&self, doc_id: &str) -> Result<Option<IndexRecord>, IndexError>;

    /// Create or fully overwrite a record / 新建或整体覆盖
    async fn upsert(&self, record: &IndexRecord) -> Result<(), IndexError>;

    async fn delete(&self, doc_id: &str) -> Result<bool, IndexError>;

    /// Every record, for in-process scoring / 读取全部记录
    async fn scan(&self) -> Result<Vec<IndexRecord>, IndexError>;

    /// Case-insensitive substring match on title, storage order / 标题子串匹配
    async fn title_contains(&self, needle: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError>;

    /// Records holding one canonical E-number / 包含指定E号的记录
    async fn with_enumber(&self, enumber: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError>;

    async fn count(&self) -> Result<u64, IndexError>;

    /// Delete records not seen since `cutoff` / 删除过期记录
    async fn prune_seen_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IndexError>;
}

#[derive(sqlx::FromRow)]
struct IndexRow {
    doc_id: String,
    title: String,
    normalized_title: Option<String>,
    enumbers: String,
    last_seen_at: i64,
}

impl TryFrom<IndexRow> for IndexRecord {
    type Error = IndexError;

    fn try_from(row: IndexRow) -> Result<Self, Self::Error> {
        let last_seen_at = Utc
            .timestamp_millis_opt(row.last_seen_at)
            .single()
            .ok_or_else(|| IndexError::Timestamp(row.last_seen_at, row.doc_id.clone()))?;
        Ok(IndexRecord {
            enumbers: serde_json::from_str(&row.enumbers)?,
            doc_id: row.doc_id,
            title: row.title,
            normalized_title: row.normalized_title,
            last_seen_at,
        })
    }
}

fn into_records(rows: Vec<IndexRow>) -> Result<Vec<IndexRecord>, IndexError> {
    rows.into_iter().map(IndexRecord::try_from).collect()
}

const SELECT_COLUMNS: &str = "SELECT doc_id, title, normalized_title, enumbers, last_seen_at FROM search_helpers";

/// 数据库搜索索引
#[derive(Clone)]
pub struct DbIndex {
    db: Pool<Sqlite>,
}

impl DbIndex {
    /// 使用现有数据库连接池
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 打开独立的索引数据库（WAL 模式）/ Open a standalone index database
    pub async fn open(database_url: &str) -> Result<Self, IndexError> {
        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;

        // 启用WAL模式，提高并发性能
        sqlx::query("PRAGMA journal_mode=WAL").execute(&db).await?;
        // 设置busy_timeout，避免锁超时
        sqlx::query("PRAGMA busy_timeout=5000").execute(&db).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&db).await?;

        tracing::info!("Search database opened: {} (WAL mode)", database_url);
        Ok(Self { db })
    }

    /// 初始化表结构，只在表不存在时创建
    pub async fn init(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_helpers (
                doc_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                title_lower TEXT NOT NULL,
                normalized_title TEXT,
                enumbers TEXT NOT NULL DEFAULT '[]',
                last_seen_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_helpers_last_seen ON search_helpers(last_seen_at)")
            .execute(&self.db)
            .await?;

        // 元数据表：存储全量同步时间等信息
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 连通性检查 / Liveness probe
    pub async fn ping(&self) -> Result<(), IndexError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    /// 设置索引更新时间 / Set index last updated time
    pub async fn set_last_updated(&self) -> Result<(), IndexError> {
        let now = Utc::now().timestamp();
        sqlx::query("INSERT OR REPLACE INTO search_meta (key, value) VALUES ('last_updated', ?)")
            .bind(now.to_string())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// 获取索引更新时间 / Get index last updated time
    pub async fn get_last_updated(&self) -> Option<i64> {
        let result: Option<(String,)> = sqlx::query_as("SELECT value FROM search_meta WHERE key = 'last_updated'")
            .fetch_optional(&self.db)
            .await
            .ok()
            .flatten();

        result.and_then(|(v,)| v.parse::<i64>().ok())
    }

    /// 获取统计信息
    pub async fn get_stats(&self) -> IndexStats {
        let document_count = match sqlx::query("SELECT COUNT(*) as total FROM search_helpers")
            .fetch_one(&self.db)
            .await
        {
            Ok(r) => r.get::<i64, _>("total").max(0) as u64,
            Err(_) => 0,
        };
        IndexStats {
            document_count,
            last_updated: self.get_last_updated().await,
        }
    }

    async fn do_upsert(&self, record: &IndexRecord) -> Result<(), IndexError> {
        let enumbers = serde_json::to_string(&record.enumbers)?;
        sqlx::query(
            r#"
            INSERT INTO search_helpers (doc_id, title, title_lower, normalized_title, enumbers, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(doc_id) DO UPDATE SET
                title = excluded.title,
                title_lower = excluded.title_lower,
                normalized_title = excluded.normalized_title,
                enumbers = excluded.enumbers,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(&record.doc_id)
        .bind(&record.title)
        .bind(record.title.to_lowercase())
        .bind(&record.normalized_title)
        .bind(enumbers)
        .bind(record.last_seen_at.timestamp_millis())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for DbIndex {
    async fn get(&self, doc_id: &str) -> Result<Option<IndexRecord>, IndexError> {
        let row = sqlx::query_as::<_, IndexRow>(&format!("{} WHERE doc_id = ?", SELECT_COLUMNS))
            .bind(doc_id)
            .fetch_optional(&self.db)
            .await?;
        row.map(IndexRecord::try_from).transpose()
    }

    /// 带重试的覆盖写入：最多重试3次
    async fn upsert(&self, record: &IndexRecord) -> Result<(), IndexError> {
        let max_retries = 3;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.do_upsert(record).await {
                Ok(()) => return Ok(()),
                Err(IndexError::Database(e))
                    if attempt < max_retries && e.to_string().contains("database is locked") =>
                {
                    // 数据库锁定，等待后重试
                    let delay = 100 * attempt as u64;
                    tracing::debug!(
                        "Database locked, retrying upsert of {} in {}ms (attempt {}/{})",
                        record.doc_id,
                        delay,
                        attempt,
                        max_retries
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn delete(&self, doc_id: &str) -> Result<bool, IndexError> {
        let result = sqlx::query("DELETE FROM search_helpers WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self) -> Result<Vec<IndexRecord>, IndexError> {
        let rows = sqlx::query_as::<_, IndexRow>(SELECT_COLUMNS)
            .fetch_all(&self.db)
            .await?;
        into_records(rows)
    }

    async fn title_contains(&self, needle: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError> {
        // instr 不解释通配符，title_lower 在写入时由 Rust 转小写（支持非 ASCII）
        let rows = sqlx::query_as::<_, IndexRow>(&format!(
            "{} WHERE instr(title_lower, ?) > 0 ORDER BY rowid LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(needle.to_lowercase())
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;
        into_records(rows)
    }

    async fn with_enumber(&self, enumber: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError> {
        let rows = sqlx::query_as::<_, IndexRow>(&format!(
            "{} WHERE EXISTS (SELECT 1 FROM json_each(search_helpers.enumbers) WHERE json_each.value = ?) \
             ORDER BY last_seen_at DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(enumber)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;
        into_records(rows)
    }

    async fn count(&self) -> Result<u64, IndexError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM search_helpers")
            .fetch_one(&self.db)
            .await?;
        Ok(total.max(0) as u64)
    }

    async fn prune_seen_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IndexError> {
        let result = sqlx::query("DELETE FROM search_helpers WHERE last_seen_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

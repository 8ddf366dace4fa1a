//! Search index schema definition / 搜索索引的 Schema 定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index record - one cached entry per remote document / 索引记录
///
/// Always written in full; there are no partial field updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Remote document ID (primary key) / 远程文档ID
    pub doc_id: String,
    /// Display title / 显示标题
    pub title: String,
    /// Title after `normalize_for_search`, fuzzy match key / 标准化标题
    pub normalized_title: Option<String>,
    /// Canonical E-numbers from title and content, sorted and distinct / 规范化E号
    pub enumbers: Vec<String>,
    /// Last sync time / 最近同步时间
    pub last_seen_at: DateTime<Utc>,
}

impl IndexRecord {
    /// Whether any of the given canonical E-numbers is held by this record / 是否包含任一E号
    pub fn holds_any(&self, enumbers: &[String]) -> bool {
        enumbers.iter().any(|e| self.enumbers.contains(e))
    }
}

/// Ranked search hit / 搜索命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub title: String,
    pub enumbers: Vec<String>,
    /// `None` when the result comes from the substring fallback / 降级查询时为空
    pub score: Option<f32>,
    pub last_seen_at: DateTime<Utc>,
}

impl SearchHit {
    pub fn unscored(record: IndexRecord) -> Self {
        Self {
            doc_id: record.doc_id,
            title: record.title,
            enumbers: record.enumbers,
            score: None,
            last_seen_at: record.last_seen_at,
        }
    }

    pub fn scored(record: IndexRecord, score: f32) -> Self {
        Self {
            score: Some(score),
            ..Self::unscored(record)
        }
    }
}

/// Result of a search query / 搜索结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// E-numbers recognised in the query text / 查询中识别出的E号
    pub enumbers_found: Vec<String>,
    /// True when the ranked query failed and the substring fallback ran / 是否降级
    pub degraded: bool,
}

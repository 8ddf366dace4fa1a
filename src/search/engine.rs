//! Search engine - tolerant E-number + trigram title search / 搜索引擎
//!
//! Ranking / 排序规则：
//! - score = max(exact, fuzzy)
//!   - exact: 1.0 when the record holds any E-number of the query / 命中E号
//!   - fuzzy: trigram similarity of normalized title vs. whole normalized query
//! - candidates: E-number hit, or any query token whose similarity to the
//!   normalized title exceeds the tolerance / 候选条件
//! - order: score desc, then last_seen_at desc / 分数降序，同分按同步时间降序
//!
//! When the ranked query fails the engine falls back to a plain
//! case-insensitive title substring match without scores. 失败时降级为子串匹配。

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::db_index::{IndexError, IndexStore};
use super::schema::{IndexRecord, SearchHit, SearchOutcome};
use super::tokenizer::{normalize_for_search, query_tokens, similarity};
use crate::enumber::EnumberCodec;

/// Default trigram tolerance / 默认相似度阈值
pub const DEFAULT_TOLERANCE: f32 = 0.8;

/// Minimum characters before suggestions are offered / 联想最少字符数
pub const MIN_SUGGEST_CHARS: usize = 2;

/// Parsed query, computed once per request / 解析后的查询
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub enumbers: Vec<String>,
    pub normalized: String,
    pub tokens: Vec<String>,
}

impl QueryPlan {
    pub fn new(codec: &EnumberCodec, text: &str) -> Self {
        let normalized = normalize_for_search(text);
        let tokens = query_tokens(&normalized).into_iter().map(str::to_string).collect();
        Self {
            enumbers: codec.extract(text),
            normalized,
            tokens,
        }
    }

    /// Whether the record is a candidate at all / 是否为候选记录
    pub fn selects(&self, record: &IndexRecord, tolerance: f32) -> bool {
        if record.holds_any(&self.enumbers) {
            return true;
        }
        match record.normalized_title.as_deref() {
            Some(title) => self.tokens.iter().any(|t| similarity(title, t) > tolerance),
            None => false,
        }
    }

    /// Relevance score in `[0, 1]` / 相关性分数
    pub fn score(&self, record: &IndexRecord) -> f32 {
        let exact = if record.holds_any(&self.enumbers) { 1.0 } else { 0.0 };
        let fuzzy = record
            .normalized_title
            .as_deref()
            .map(|title| similarity(title, &self.normalized))
            .unwrap_or(0.0);
        f32::max(exact, fuzzy)
    }
}

/// Filter, score, sort and truncate scanned records / 过滤、评分、排序
///
/// Blocking: runs on rayon and is called from `spawn_blocking`.
pub fn rank(plan: &QueryPlan, records: Vec<IndexRecord>, tolerance: f32, limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = records
        .into_par_iter()
        .filter(|r| plan.selects(r, tolerance))
        .map(|r| {
            let score = plan.score(&r);
            SearchHit::scored(r, score)
        })
        .collect();

    hits.sort_by(|a, b| {
        let sa = a.score.unwrap_or(0.0);
        let sb = b.score.unwrap_or(0.0);
        sb.partial_cmp(&sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
    });
    hits.truncate(limit);
    hits
}

/// Search index / 搜索索引
///
/// Stateless per call; every query reads the current store contents.
#[derive(Clone)]
pub struct SearchIndex {
    store: Arc<dyn IndexStore>,
    codec: Arc<EnumberCodec>,
    tolerance: f32,
}

impl SearchIndex {
    pub fn new(store: Arc<dyn IndexStore>, codec: Arc<EnumberCodec>) -> Self {
        Self {
            store,
            codec,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Ranked search / 排序搜索
    ///
    /// Never fails: store errors degrade to the substring fallback, and a
    /// failing fallback yields an empty result.
    pub async fn query(&self, text: &str, limit: usize) -> SearchOutcome {
        if text.trim().is_empty() {
            return SearchOutcome::default();
        }

        let plan = QueryPlan::new(&self.codec, text);
        match self.ranked(&plan, limit).await {
            Ok(hits) => SearchOutcome {
                hits,
                enumbers_found: plan.enumbers,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!("Ranked search failed, falling back to title match: {}", e);
                let hits = match self.store.title_contains(text, limit).await {
                    Ok(records) => records.into_iter().map(SearchHit::unscored).collect(),
                    Err(e) => {
                        tracing::error!("Fallback title search failed: {}", e);
                        Vec::new()
                    }
                };
                SearchOutcome {
                    hits,
                    enumbers_found: plan.enumbers,
                    degraded: true,
                }
            }
        }
    }

    async fn ranked(&self, plan: &QueryPlan, limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        if plan.enumbers.is_empty() && plan.tokens.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.store.scan().await?;
        let tolerance = self.tolerance;
        let scoring = plan.clone();
        // 评分为CPU密集任务，移出异步运行时
        let hits = tokio::task::spawn_blocking(move || rank(&scoring, records, tolerance, limit))
            .await
            .map_err(|e| IndexError::Unavailable(format!("ranking task failed: {}", e)))?;

        tracing::debug!(
            "Search '{}': {} E-numbers, {} tokens, {} hits",
            plan.normalized,
            plan.enumbers.len(),
            plan.tokens.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Title and E-number suggestions for a partial query / 搜索联想
    pub async fn suggest(&self, text: &str, limit: usize) -> Vec<String> {
        let text = text.trim();
        if text.chars().count() < MIN_SUGGEST_CHARS || limit == 0 {
            return Vec::new();
        }

        let mut suggestions: BTreeSet<String> = BTreeSet::new();

        match self.store.title_contains(text, limit).await {
            Ok(records) => suggestions.extend(records.into_iter().map(|r| r.title)),
            Err(e) => tracing::warn!("Title suggestions failed: {}", e),
        }

        if let Some(enumber) = self.codec.normalize(text) {
            match self.store.with_enumber(&enumber, limit).await {
                Ok(records) => suggestions.extend(records.into_iter().flat_map(|r| r.enumbers)),
                Err(e) => tracing::warn!("E-number suggestions failed: {}", e),
            }
        }

        suggestions.into_iter().take(limit).collect()
    }
}

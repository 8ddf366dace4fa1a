//! In-memory index store / 内存索引存储
//!
//! Same contract as `DbIndex`, kept in a `HashMap`. The server always runs
//! on `DbIndex`; this store backs the engine and sync tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::db_index::{IndexError, IndexStore};
use super::schema::IndexRecord;

/// In-memory index / 内存索引
#[derive(Default)]
pub struct MemoryIndex {
    /// doc_id -> (insertion order, record) / 文档存储
    records: RwLock<HashMap<String, (u64, IndexRecord)>>,
    next_seq: RwLock<u64>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in insertion order / 按插入顺序
    fn ordered(&self) -> Vec<IndexRecord> {
        let records = self.records.read();
        let mut entries: Vec<_> = records.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl IndexStore for MemoryIndex {
    async fn get(&self, doc_id: &str) -> Result<Option<IndexRecord>, IndexError> {
        Ok(self.records.read().get(doc_id).map(|(_, r)| r.clone()))
    }

    async fn upsert(&self, record: &IndexRecord) -> Result<(), IndexError> {
        let mut records = self.records.write();
        if let Some(entry) = records.get_mut(&record.doc_id) {
            entry.1 = record.clone();
            return Ok(());
        }
        let seq = {
            let mut next = self.next_seq.write();
            *next += 1;
            *next
        };
        records.insert(record.doc_id.clone(), (seq, record.clone()));
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<bool, IndexError> {
        Ok(self.records.write().remove(doc_id).is_some())
    }

    async fn scan(&self) -> Result<Vec<IndexRecord>, IndexError> {
        Ok(self.ordered())
    }

    async fn title_contains(&self, needle: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError> {
        let needle = needle.to_lowercase();
        Ok(self
            .ordered()
            .into_iter()
            .filter(|r| r.title.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }

    async fn with_enumber(&self, enumber: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError> {
        let mut hits: Vec<_> = self
            .ordered()
            .into_iter()
            .filter(|r| r.enumbers.iter().any(|e| e == enumber))
            .collect();
        hits.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, IndexError> {
        Ok(self.records.read().len() as u64)
    }

    async fn prune_seen_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IndexError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, (_, r)| r.last_seen_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

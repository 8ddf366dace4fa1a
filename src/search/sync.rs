//! Index write path - keeps search helpers in step with Paperless / 索引同步
//!
//! Call direction: sync → paperless (read) → index store (write).
//! Records are always rewritten in full.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::db_index::IndexStore;
use super::schema::IndexRecord;
use super::tokenizer::normalize_for_search;
use crate::enumber::EnumberCodec;
use crate::paperless::{DocumentStore, RemoteDocument};

/// Concurrent upserts per page / 每页并发写入数
const UPSERT_CONCURRENCY: usize = 4;

/// Sync progress / 同步进度
#[derive(Debug, Clone, Serialize)]
pub struct SyncProgress {
    pub is_running: bool,
    pub is_done: bool,
    pub synced: u64,
    pub failed: u64,
    pub pruned: u64,
    pub error: Option<String>,
    pub last_done_time: Option<i64>,
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self {
            is_running: false,
            is_done: true,
            synced: 0,
            failed: 0,
            pruned: 0,
            error: None,
            last_done_time: None,
        }
    }
}

/// Sync state management / 同步状态管理
pub struct SyncState {
    running: AtomicBool,
    cancel_flag: AtomicBool,
    synced: AtomicU64,
    failed: AtomicU64,
    progress: RwLock<SyncProgress>,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel_flag: AtomicBool::new(false),
            synced: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            progress: RwLock::new(SyncProgress::default()),
        }
    }

    /// Mark a sync as started; false if one is already running / 开始同步
    pub fn try_start(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.cancel_flag.store(false, Ordering::SeqCst);
        self.synced.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        let mut progress = self.progress.write();
        progress.is_running = true;
        progress.is_done = false;
        progress.synced = 0;
        progress.failed = 0;
        progress.pruned = 0;
        progress.error = None;
        true
    }

    pub fn record_synced(&self) {
        let count = self.synced.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.write().synced = count;
    }

    pub fn record_failed(&self) {
        let count = self.failed.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.write().failed = count;
    }

    pub fn finish(&self, pruned: u64, error: Option<String>) {
        self.running.store(false, Ordering::SeqCst);
        let mut progress = self.progress.write();
        progress.is_running = false;
        progress.is_done = error.is_none();
        progress.pruned = pruned;
        progress.error = error;
        progress.last_done_time = Some(Utc::now().timestamp());
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn get_progress(&self) -> SyncProgress {
        self.progress.read().clone()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a finished full sync / 全量同步结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub synced: u64,
    pub failed: u64,
    pub pruned: u64,
}

/// Build the index record for one document / 构建索引记录
///
/// E-numbers come from title and content; only the title is normalized.
pub fn build_record(
    codec: &EnumberCodec,
    doc_id: &str,
    title: &str,
    content: Option<&str>,
    seen_at: DateTime<Utc>,
) -> IndexRecord {
    let text = format!("{} {}", title, content.unwrap_or_default());
    let normalized = normalize_for_search(title);
    IndexRecord {
        doc_id: doc_id.to_string(),
        title: title.to_string(),
        normalized_title: if normalized.is_empty() { None } else { Some(normalized) },
        enumbers: codec.extract(text.as_str()),
        last_seen_at: seen_at,
    }
}

fn record_for(codec: &EnumberCodec, doc: &RemoteDocument, seen_at: DateTime<Utc>) -> IndexRecord {
    build_record(codec, &doc.id.to_string(), &doc.title, doc.content.as_deref(), seen_at)
}

/// Refresh one document / 同步单个文档
///
/// Returns the written record, or `None` when the document is gone remotely
/// (its stale record is removed).
pub async fn sync_document(
    store: &dyn IndexStore,
    documents: &dyn DocumentStore,
    codec: &EnumberCodec,
    doc_id: &str,
) -> Result<Option<IndexRecord>> {
    match documents.get_document(doc_id).await? {
        Some(doc) => {
            let record = record_for(codec, &doc, Utc::now());
            store.upsert(&record).await?;
            tracing::debug!("Synced document {} ({} E-numbers)", doc_id, record.enumbers.len());
            Ok(Some(record))
        }
        None => {
            if store.delete(doc_id).await? {
                tracing::info!("Removed index record of deleted document {}", doc_id);
            }
            Ok(None)
        }
    }
}

/// Full sync over every remote document / 全量同步
///
/// Records not seen during a complete pass are pruned afterwards. A failed
/// or cancelled pass, or one where any upsert failed, prunes nothing.
pub async fn sync_all(
    store: &dyn IndexStore,
    documents: &dyn DocumentStore,
    codec: &EnumberCodec,
    page_size: u32,
    state: &SyncState,
) -> Result<SyncReport> {
    let started = Utc::now();
    let page_size = page_size.max(1);
    let mut page = 1;

    loop {
        if state.is_cancelled() {
            return Err(anyhow!("Sync cancelled"));
        }

        let batch = documents.list_documents(page, page_size).await?;
        tracing::debug!("Sync page {}: {} documents", page, batch.results.len());
        let seen_at = Utc::now();

        stream::iter(batch.results.iter())
            .for_each_concurrent(UPSERT_CONCURRENCY, move |doc| async move {
                let record = record_for(codec, doc, seen_at);
                match store.upsert(&record).await {
                    Ok(()) => state.record_synced(),
                    Err(e) => {
                        tracing::warn!("Failed to index document {}: {}", doc.id, e);
                        state.record_failed();
                    }
                }
            })
            .await;

        if batch.next.is_none() || batch.results.is_empty() {
            break;
        }
        page += 1;
    }

    let progress = state.get_progress();
    // 有写入失败时，旧记录的 last_seen_at 未刷新，不能据此清理
    let pruned = if progress.failed > 0 {
        tracing::warn!("Skipping prune: {} documents failed to index", progress.failed);
        0
    } else {
        store.prune_seen_before(started).await?
    };
    tracing::info!(
        "Sync finished: {} synced, {} failed, {} pruned",
        progress.synced,
        progress.failed,
        pruned
    );

    Ok(SyncReport {
        synced: progress.synced,
        failed: progress.failed,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paperless::DocumentPage;
    use crate::search::db_index::IndexError;
    use crate::search::memory::MemoryIndex;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::collections::BTreeMap;

    /// Remote store backed by a map / 基于内存的远程存储
    struct FakeRemote {
        docs: BTreeMap<i64, RemoteDocument>,
    }

    impl FakeRemote {
        fn new(docs: &[(i64, &str, Option<&str>)]) -> Self {
            let docs = docs
                .iter()
                .map(|(id, title, content)| {
                    (
                        *id,
                        RemoteDocument {
                            id: *id,
                            title: title.to_string(),
                            content: content.map(str::to_string),
                            ..Default::default()
                        },
                    )
                })
                .collect();
            Self { docs }
        }
    }

    #[async_trait]
    impl DocumentStore for FakeRemote {
        async fn get_document(&self, doc_id: &str) -> Result<Option<RemoteDocument>> {
            let id: i64 = doc_id.parse()?;
            Ok(self.docs.get(&id).cloned())
        }

        async fn list_documents(&self, page: u32, page_size: u32) -> Result<DocumentPage> {
            let all: Vec<_> = self.docs.values().cloned().collect();
            let start = ((page - 1) * page_size) as usize;
            let end = (start + page_size as usize).min(all.len());
            let results = all.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
            let next = if end < all.len() { Some(format!("page={}", page + 1)) } else { None };
            Ok(DocumentPage {
                count: all.len() as u64,
                next,
                results,
            })
        }

        async fn test_connection(&self) -> bool {
            true
        }
    }

    struct Offline;

    #[async_trait]
    impl DocumentStore for Offline {
        async fn get_document(&self, _: &str) -> Result<Option<RemoteDocument>> {
            Err(anyhow!("connection refused"))
        }
        async fn list_documents(&self, _: u32, _: u32) -> Result<DocumentPage> {
            Err(anyhow!("connection refused"))
        }
        async fn test_connection(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_build_record() {
        let codec = EnumberCodec::new().unwrap();
        let now = Utc::now();
        let record = build_record(
            &codec,
            "7",
            "Prüfbericht E13*1234*5678*00",
            Some("Nachtrag zu e4-0001-0002-01 und E13 1234 5678 00"),
            now,
        );
        assert_eq!(record.doc_id, "7");
        assert_eq!(record.title, "Prüfbericht E13*1234*5678*00");
        assert_eq!(record.normalized_title.as_deref(), Some("prufbericht e13 1234 5678 00"));
        assert_eq!(record.enumbers, vec!["e04*0001*0002*01", "e13*1234*5678*00"]);
        assert_eq!(record.last_seen_at, now);
    }

    #[test]
    fn test_build_record_without_content() {
        let codec = EnumberCodec::new().unwrap();
        let record = build_record(&codec, "1", "---", None, Utc::now());
        assert_eq!(record.normalized_title, None);
        assert!(record.enumbers.is_empty());
    }

    #[tokio::test]
    async fn test_sync_document() {
        let codec = EnumberCodec::new().unwrap();
        let store = MemoryIndex::new();
        let remote = FakeRemote::new(&[(1, "Felge", Some("ABE e13*1234*5678*00"))]);

        let record = sync_document(&store, &remote, &codec, "1").await.unwrap().unwrap();
        assert_eq!(record.enumbers, vec!["e13*1234*5678*00"]);
        assert_eq!(store.get("1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_sync_document_removes_deleted() {
        let codec = EnumberCodec::new().unwrap();
        let store = MemoryIndex::new();
        store
            .upsert(&build_record(&codec, "9", "Alt", None, Utc::now()))
            .await
            .unwrap();

        let remote = FakeRemote::new(&[]);
        assert_eq!(sync_document(&store, &remote, &codec, "9").await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sync_document_remote_error() {
        let codec = EnumberCodec::new().unwrap();
        let store = MemoryIndex::new();
        assert!(sync_document(&store, &Offline, &codec, "1").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_all_pages_and_prunes() {
        let codec = EnumberCodec::new().unwrap();
        let store = MemoryIndex::new();
        store
            .upsert(&build_record(&codec, "99", "Verwaist", None, Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let remote = FakeRemote::new(&[
            (1, "Felge", Some("e13*1234*5678*00")),
            (2, "Rad", None),
            (3, "Reifen", None),
            (4, "Scheinwerfer", Some("E4 0001 0002 01")),
            (5, "Bremse", None),
        ]);
        let state = SyncState::new();
        assert!(state.try_start());
        assert!(!state.try_start());

        let report = sync_all(&store, &remote, &codec, 2, &state).await.unwrap();
        state.finish(report.pruned, None);

        assert_eq!(report, SyncReport { synced: 5, failed: 0, pruned: 1 });
        assert_eq!(store.count().await.unwrap(), 5);
        assert!(store.get("99").await.unwrap().is_none());
        assert_eq!(
            store.get("4").await.unwrap().unwrap().enumbers,
            vec!["e04*0001*0002*01"]
        );

        let progress = state.get_progress();
        assert!(!progress.is_running);
        assert!(progress.is_done);
        assert_eq!(progress.synced, 5);
        assert!(state.try_start());
    }

    #[tokio::test]
    async fn test_sync_all_failure_keeps_records() {
        let codec = EnumberCodec::new().unwrap();
        let store = MemoryIndex::new();
        store
            .upsert(&build_record(&codec, "1", "Felge", None, Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let state = SyncState::new();
        state.try_start();
        assert!(sync_all(&store, &Offline, &codec, 10, &state).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    /// Store whose upserts fail for selected documents / 指定文档写入失败的存储
    struct FlakyStore {
        inner: MemoryIndex,
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl IndexStore for FlakyStore {
        async fn get(&self, doc_id: &str) -> Result<Option<IndexRecord>, IndexError> {
            self.inner.get(doc_id).await
        }
        async fn upsert(&self, record: &IndexRecord) -> Result<(), IndexError> {
            if self.failing.contains(&record.doc_id.as_str()) {
                return Err(IndexError::Unavailable("database is locked".to_string()));
            }
            self.inner.upsert(record).await
        }
        async fn delete(&self, doc_id: &str) -> Result<bool, IndexError> {
            self.inner.delete(doc_id).await
        }
        async fn scan(&self) -> Result<Vec<IndexRecord>, IndexError> {
            self.inner.scan().await
        }
        async fn title_contains(&self, needle: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError> {
            self.inner.title_contains(needle, limit).await
        }
        async fn with_enumber(&self, enumber: &str, limit: usize) -> Result<Vec<IndexRecord>, IndexError> {
            self.inner.with_enumber(enumber, limit).await
        }
        async fn count(&self) -> Result<u64, IndexError> {
            self.inner.count().await
        }
        async fn prune_seen_before(&self, cutoff: DateTime<Utc>) -> Result<u64, IndexError> {
            self.inner.prune_seen_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn test_sync_all_failed_upsert_keeps_records() {
        let codec = EnumberCodec::new().unwrap();
        let store = FlakyStore {
            inner: MemoryIndex::new(),
            failing: vec!["1"],
        };
        let yesterday = Utc::now() - Duration::days(1);
        store
            .inner
            .upsert(&build_record(&codec, "1", "Felge", None, yesterday))
            .await
            .unwrap();
        store
            .inner
            .upsert(&build_record(&codec, "99", "Verwaist", None, yesterday))
            .await
            .unwrap();

        let remote = FakeRemote::new(&[(1, "Felge", None), (2, "Rad", None)]);
        let state = SyncState::new();
        state.try_start();

        let report = sync_all(&store, &remote, &codec, 10, &state).await.unwrap();
        assert_eq!(report, SyncReport { synced: 1, failed: 1, pruned: 0 });
        assert!(store.get("1").await.unwrap().is_some());
        assert!(store.get("2").await.unwrap().is_some());
        assert!(store.get("99").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_all_cancelled() {
        let codec = EnumberCodec::new().unwrap();
        let store = MemoryIndex::new();
        let state = SyncState::new();
        state.try_start();
        state.cancel();

        let remote = FakeRemote::new(&[(1, "Felge", None)]);
        assert!(sync_all(&store, &remote, &codec, 10, &state).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}

//! In-memory collaborators with failure switches, for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tabmap_map::CommitRequest;
use tabmap_model::{DraftState, SavedTabMapping};

use super::{CommitEndpoint, LocalDraftCache, RemoteDraftStore, SavedMappingStore};
use crate::error::{Result, SessionError};

type DraftKey = (String, String);

fn key(source_id: &str, tab: &str) -> DraftKey {
    (source_id.to_string(), tab.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Draft store held in memory. Usable as local cache and as remote store.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<DraftKey, DraftState>>,
    failing: AtomicBool,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_draft(self, source_id: &str, tab: &str, draft: DraftState) -> Self {
        lock(&self.drafts).insert(key(source_id, tab), draft);
        self
    }

    pub fn draft(&self, source_id: &str, tab: &str) -> Option<DraftState> {
        lock(&self.drafts).get(&key(source_id, tab)).cloned()
    }

    /// Makes every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful deletes.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::remote(operation, "draft store unavailable"));
        }
        Ok(())
    }

    fn store(&self, source_id: &str, tab: &str, draft: &DraftState) -> Result<()> {
        self.check("draft write")?;
        lock(&self.drafts).insert(key(source_id, tab), draft.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn drop_draft(&self, source_id: &str, tab: &str) -> Result<()> {
        self.check("draft delete")?;
        lock(&self.drafts).remove(&key(source_id, tab));
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl LocalDraftCache for MemoryDraftStore {
    fn read(&self, source_id: &str, tab: &str) -> Result<Option<DraftState>> {
        self.check("draft read")?;
        Ok(self.draft(source_id, tab))
    }

    fn write(&self, source_id: &str, tab: &str, draft: &DraftState) -> Result<()> {
        self.store(source_id, tab, draft)
    }

    fn remove(&self, source_id: &str, tab: &str) -> Result<()> {
        self.drop_draft(source_id, tab)
    }
}

impl RemoteDraftStore for MemoryDraftStore {
    async fn get(&self, source_id: &str, tab: &str) -> Result<Option<DraftState>> {
        self.check("draft fetch")?;
        Ok(self.draft(source_id, tab))
    }

    async fn put(&self, source_id: &str, tab: &str, draft: &DraftState) -> Result<()> {
        self.store(source_id, tab, draft)
    }

    async fn delete(&self, source_id: &str, tab: &str) -> Result<()> {
        self.drop_draft(source_id, tab)
    }
}

/// Committed mappings held in memory.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    sources: Mutex<HashMap<String, Vec<SavedTabMapping>>>,
    failing_reads: AtomicBool,
    failing_commits: AtomicBool,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(self, source_id: &str, mapping: SavedTabMapping) -> Self {
        lock(&self.sources)
            .entry(source_id.to_string())
            .or_default()
            .push(mapping);
        self
    }

    pub fn mapping(&self, source_id: &str, tab: &str) -> Option<SavedTabMapping> {
        lock(&self.sources)
            .get(source_id)
            .and_then(|tabs| tabs.iter().find(|m| m.tab == tab).cloned())
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_commits(&self, failing: bool) {
        self.failing_commits.store(failing, Ordering::SeqCst);
    }
}

impl SavedMappingStore for MemoryMappingStore {
    async fn get(&self, source_id: &str) -> Result<Vec<SavedTabMapping>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(SessionError::remote("mapping fetch", "mapping store unavailable"));
        }
        Ok(lock(&self.sources).get(source_id).cloned().unwrap_or_default())
    }
}

impl CommitEndpoint for MemoryMappingStore {
    async fn commit(&self, source_id: &str, tab: &str, request: &CommitRequest) -> Result<()> {
        if self.failing_commits.load(Ordering::SeqCst) {
            return Err(SessionError::Commit {
                message: "commit endpoint unavailable".to_string(),
            });
        }
        let mut sources = lock(&self.sources);
        let tabs = sources.entry(source_id.to_string()).or_default();
        tabs.retain(|m| m.tab != tab);
        tabs.push(request.clone().into_saved(tab));
        Ok(())
    }
}

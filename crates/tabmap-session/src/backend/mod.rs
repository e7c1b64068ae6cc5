//! Collaborator interfaces consumed by a mapping session, with JSON-file and
//! in-memory implementations.
//!
//! Remote collaborators are async and return `Send` futures so their calls
//! can run on scheduled tasks. The local draft cache is synchronous: a
//! snapshot must be in the cache before the edit that produced it returns.

mod json;
mod memory;

use std::future::Future;

use tabmap_map::CommitRequest;
use tabmap_model::{DraftState, RawSheet, SavedTabMapping, Suggestion, SuggestionRequest};

use crate::error::Result;

pub use json::{JsonDraftDir, JsonMappingRepository, StoredTabMapping};
pub use memory::{MemoryDraftStore, MemoryMappingStore};

/// Draft cache on the local machine.
pub trait LocalDraftCache: Send + Sync + 'static {
    fn read(&self, source_id: &str, tab: &str) -> Result<Option<DraftState>>;
    fn write(&self, source_id: &str, tab: &str, draft: &DraftState) -> Result<()>;
    fn remove(&self, source_id: &str, tab: &str) -> Result<()>;
}

/// Draft store shared across machines.
pub trait RemoteDraftStore: Send + Sync + 'static {
    fn get(
        &self,
        source_id: &str,
        tab: &str,
    ) -> impl Future<Output = Result<Option<DraftState>>> + Send;

    fn put(
        &self,
        source_id: &str,
        tab: &str,
        draft: &DraftState,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, source_id: &str, tab: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Previously committed mappings of a source, one entry per tab.
pub trait SavedMappingStore: Send + Sync + 'static {
    fn get(&self, source_id: &str) -> impl Future<Output = Result<Vec<SavedTabMapping>>> + Send;
}

/// Receives the final mapping of a tab.
pub trait CommitEndpoint: Send + Sync + 'static {
    fn commit(
        &self,
        source_id: &str,
        tab: &str,
        request: &CommitRequest,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Classification assistant.
pub trait SuggestionService: Send + Sync {
    fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> impl Future<Output = Result<Suggestion>> + Send;
}

/// Raw tab contents.
pub trait SheetSource: Send + Sync {
    fn fetch(&self, source_id: &str, tab: &str) -> impl Future<Output = Result<RawSheet>> + Send;
}

//! Mapping sessions: draft reconciliation on load, debounced draft
//! persistence while editing, and the collaborators both talk to.

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod sink;

pub use backend::{
    CommitEndpoint, JsonDraftDir, JsonMappingRepository, LocalDraftCache, MemoryDraftStore,
    MemoryMappingStore, RemoteDraftStore, SavedMappingStore, SheetSource, SuggestionService,
};
pub use cache::{CachedSheetSource, DEFAULT_CACHE_TTL, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use reconcile::{
    DraftCandidates, ReconcileGuard, Reconciled, Reconciler, RestoreSource, reconcile,
};
pub use scheduler::{CancelToken, ManualScheduler, Scheduler, Task, TokioScheduler};
pub use session::{MappingSession, SessionBackends};
pub use sink::DraftSink;

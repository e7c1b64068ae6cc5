//! End-to-end session behavior over in-memory collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tabmap_model::{
    Authority, Category, ColumnClassification, DraftState, EntityType, FieldSchema, Phase,
    IndexedSuggestion, RawSheet, SavedColumnMapping, SavedTabMapping, Suggestion,
    SuggestionRequest,
};
use tabmap_session::{
    LocalDraftCache, ManualClock, ManualScheduler, MappingSession, MemoryDraftStore,
    MemoryMappingStore, RestoreSource, SessionBackends, SessionConfig, SessionError, SheetSource,
    SuggestionService,
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const NOW: i64 = 30 * DAY_MS;
const SOURCE: &str = "sheet-1";
const TAB: &str = "Partners";

type TestSession = MappingSession<
    MemoryDraftStore,
    MemoryDraftStore,
    MemoryMappingStore,
    ManualScheduler,
    ManualClock,
>;

struct Harness {
    local: Arc<MemoryDraftStore>,
    remote: Arc<MemoryDraftStore>,
    saved: Arc<MemoryMappingStore>,
    scheduler: Arc<ManualScheduler>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with(
            MemoryDraftStore::new(),
            MemoryDraftStore::new(),
            MemoryMappingStore::new(),
        )
    }

    fn with(local: MemoryDraftStore, remote: MemoryDraftStore, saved: MemoryMappingStore) -> Self {
        Self {
            local: Arc::new(local),
            remote: Arc::new(remote),
            saved: Arc::new(saved),
            scheduler: Arc::new(ManualScheduler::new()),
            clock: Arc::new(ManualClock::new(NOW)),
        }
    }

    fn session(&self) -> TestSession {
        MappingSession::new(
            SOURCE,
            TAB,
            SessionBackends {
                local: Arc::clone(&self.local),
                remote: Arc::clone(&self.remote),
                saved: Arc::clone(&self.saved),
            },
            Arc::clone(&self.scheduler),
            Arc::clone(&self.clock),
            SessionConfig::default(),
        )
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| (*c).to_string()).collect()
}

fn sheet() -> RawSheet {
    RawSheet::new(
        vec![
            row(&["Brand Name", "W1 3/1", "", "Email"]),
            row(&["Acme", "12", "", "ops@acme.io"]),
            row(&["Globex", "3", "", "hi@globex.io"]),
        ],
        0,
        95,
    )
}

fn draft(timestamp: i64, category: Category) -> DraftState {
    DraftState {
        phase: Phase::Classify,
        header_row: 0,
        columns: vec![
            ColumnClassification::new(0, "Brand").with_category(category),
            ColumnClassification::new(1, "W1 3/1").with_category(Category::Weekly),
        ],
        timestamp,
    }
}

fn saved_row(name: &str, index: usize, category: Option<&str>) -> SavedColumnMapping {
    SavedColumnMapping {
        source_column: name.to_string(),
        source_column_index: index,
        category: category.map(str::to_string),
        target_field: None,
        authority: None,
        is_key: false,
        tags: Vec::new(),
    }
}

fn categories(session: &TestSession) -> Vec<Category> {
    session.store().columns().iter().map(|c| c.category).collect()
}

#[tokio::test]
async fn fresh_load_uses_heuristics() {
    let harness = Harness::new();
    let mut session = harness.session();

    assert_eq!(session.load(sheet()).await, RestoreSource::Fresh);
    assert_eq!(
        categories(&session),
        vec![
            Category::Unclassified,
            Category::Weekly,
            Category::Skip,
            Category::Unclassified
        ]
    );
    assert_eq!(session.store().phase(), Phase::Preview);
    // loading alone writes nothing
    assert_eq!(harness.local.write_count(), 0);
}

#[tokio::test]
async fn completed_mapping_beats_drafts_and_deletes_them() {
    let mut brand = saved_row("Brand Name", 0, Some("partner"));
    brand.is_key = true;
    brand.target_field = Some("brand_name".to_string());
    let mapping = SavedTabMapping::new(
        TAB.to_string(),
        0,
        vec![brand, saved_row("Email", 3, Some("staff"))],
    );
    let harness = Harness::with(
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW, Category::Staff)),
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW + 5, Category::Asin)),
        MemoryMappingStore::new().with_mapping(SOURCE, mapping),
    );
    let mut session = harness.session();

    assert_eq!(session.load(sheet()).await, RestoreSource::CompletedMapping);
    let columns = session.store().columns();
    assert_eq!(columns[0].category, Category::Partner);
    assert!(columns[0].is_key);
    assert_eq!(columns[0].target_field.as_deref(), Some("brand_name"));
    // headers without a saved row are seeded
    assert_eq!(columns[1].category, Category::Weekly);
    assert_eq!(columns[3].category, Category::Staff);
    assert_eq!(session.store().phase(), Phase::Classify);

    assert!(harness.local.draft(SOURCE, TAB).is_none());
    assert!(harness.remote.draft(SOURCE, TAB).is_none());
}

#[tokio::test]
async fn malformed_saved_rows_are_skipped_individually() {
    let mapping = SavedTabMapping::new(
        TAB.to_string(),
        0,
        vec![
            saved_row("Brand Name", 0, Some("vendor")),
            saved_row("Email", 3, Some("staff")),
        ],
    );
    let harness = Harness::with(
        MemoryDraftStore::new(),
        MemoryDraftStore::new(),
        MemoryMappingStore::new().with_mapping(SOURCE, mapping),
    );
    let mut session = harness.session();
    session.load(sheet()).await;

    assert_eq!(session.restored().map(|r| r.skipped_rows), Some(1));
    assert_eq!(session.store().columns()[0].category, Category::Unclassified);
    assert_eq!(session.store().columns()[3].category, Category::Staff);
}

#[tokio::test]
async fn newer_local_draft_wins() {
    let harness = Harness::with(
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW - 1_000, Category::Staff)),
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW - 2_000, Category::Partner)),
        MemoryMappingStore::new(),
    );
    let mut session = harness.session();

    assert_eq!(session.load(sheet()).await, RestoreSource::LocalDraft);
    assert_eq!(session.store().columns()[0].category, Category::Staff);
    assert_eq!(session.store().columns()[0].source_column, "Brand Name");
    // the draft is upgraded to the live header row
    assert_eq!(session.store().len(), 4);
    assert_eq!(session.store().columns()[2].category, Category::Skip);
}

#[tokio::test]
async fn stale_drafts_fall_back_to_heuristics() {
    let harness = Harness::with(
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW - 8 * DAY_MS, Category::Staff)),
        MemoryDraftStore::new(),
        MemoryMappingStore::new(),
    );
    let mut session = harness.session();
    assert_eq!(session.load(sheet()).await, RestoreSource::Fresh);
}

#[tokio::test]
async fn fetch_failures_count_as_absent() {
    let harness = Harness::with(
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW, Category::Staff)),
        MemoryDraftStore::new().with_draft(SOURCE, TAB, draft(NOW + 1, Category::Partner)),
        MemoryMappingStore::new(),
    );
    harness.remote.set_failing(true);
    harness.saved.set_failing_reads(true);
    let mut session = harness.session();

    assert_eq!(session.load(sheet()).await, RestoreSource::LocalDraft);
}

#[tokio::test]
async fn load_runs_only_once() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    session.set_category(0, Category::Partner);

    let other = RawSheet::new(vec![row(&["Other"])], 0, 10);
    assert_eq!(session.load(other).await, RestoreSource::Fresh);
    assert_eq!(session.store().len(), 4);
    assert_eq!(session.store().columns()[0].category, Category::Partner);
}

#[tokio::test]
async fn edits_are_written_locally_then_debounced_remotely() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;

    session.set_category(0, Category::Partner);
    session.toggle_key(0);
    session.set_authority(3, Authority::Reference);
    assert_eq!(harness.local.write_count(), 3);
    assert_eq!(harness.remote.write_count(), 0);

    harness.scheduler.advance(Duration::from_millis(499)).await;
    assert_eq!(harness.remote.write_count(), 0);
    harness.scheduler.advance(Duration::from_millis(1)).await;
    assert_eq!(harness.remote.write_count(), 1);

    let remote = harness.remote.draft(SOURCE, TAB).unwrap();
    assert!(remote.columns[0].is_key);
    assert_eq!(remote.timestamp, NOW);
}

#[tokio::test]
async fn category_change_after_key_revokes_it() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;

    session.set_category(2, Category::Staff);
    assert!(session.toggle_key(2));
    session.set_category(2, Category::Partner);

    let column = &session.store().columns()[2];
    assert_eq!(column.category, Category::Partner);
    assert!(!column.is_key);
}

#[tokio::test]
async fn undo_reverts_a_bulk_change() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    let before = categories(&session);

    assert_eq!(session.set_category_bulk(&[0, 3, 99], Category::Staff), 2);
    assert_eq!(session.history().len(), 1);
    assert!(session.undo());
    assert_eq!(categories(&session), before);
    assert!(!session.undo());
}

#[tokio::test]
async fn close_flushes_pending_draft() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    session.set_category(0, Category::Partner);

    assert!(session.close());
    harness.scheduler.run_due().await;
    assert_eq!(harness.remote.write_count(), 1);
    assert_eq!(harness.scheduler.pending(), 0);
}

#[tokio::test]
async fn map_phase_auto_matches_once_and_clears_history() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    assert!(session.enter_map_phase(&FieldSchema::builtin()).is_none());

    assert!(session.begin_classification());
    session.set_category(0, Category::Partner);
    session.set_category(3, Category::Staff);
    let report = session.enter_map_phase(&FieldSchema::builtin()).unwrap();

    assert_eq!(report.assigned.len(), 2);
    assert_eq!(
        session.store().columns()[0].target_field.as_deref(),
        Some("brand_name")
    );
    assert_eq!(session.store().columns()[3].target_field.as_deref(), Some("email"));
    assert!(session.history().is_empty());
    assert!(session.enter_map_phase(&FieldSchema::builtin()).is_none());
    assert!(session.back_to_classify());
}

struct ScriptedAssistant {
    calls: AtomicUsize,
}

impl SuggestionService for ScriptedAssistant {
    async fn suggest(&self, request: &SuggestionRequest) -> tabmap_session::Result<Suggestion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.column_name == "Email" {
            return Err(SessionError::remote("suggest", "timeout"));
        }
        assert_eq!(request.context.as_deref(), Some(TAB));
        Ok(Suggestion {
            category: Category::Partner,
            target_field: Some("brand_name".to_string()),
            authority: Authority::SourceOfTruth,
            confidence: 1.4,
            is_key: true,
        })
    }
}

#[tokio::test]
async fn suggestions_apply_in_bulk_and_skip_failures() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    let assistant = ScriptedAssistant {
        calls: AtomicUsize::new(0),
    };

    let request = session.suggestion_request(0).unwrap();
    assert_eq!(request.sample_values, vec!["Acme", "Globex"]);
    assert_eq!(request.sibling_columns.len(), 3);

    assert_eq!(session.request_suggestions(&assistant, &[0, 3, 42]).await, 1);
    assert_eq!(assistant.calls.load(Ordering::SeqCst), 2);

    let column = &session.store().columns()[0];
    assert_eq!(column.category, Category::Partner);
    assert!(column.ai_suggested);
    assert_eq!(column.ai_confidence, 1.0);
    assert!(!column.is_key);

    assert!(session.undo());
    assert_eq!(session.store().columns()[0].category, Category::Unclassified);
}

#[tokio::test]
async fn commit_saves_mapping_and_clears_drafts() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    session.set_category(0, Category::Partner);
    session.toggle_key(0);

    let request = session.commit(harness.saved.as_ref()).await.unwrap();
    assert_eq!(request.primary_entity, Some(EntityType::Partner));

    let saved = harness.saved.mapping(SOURCE, TAB).unwrap();
    assert_eq!(saved.column_mappings[0].category.as_deref(), Some("partner"));
    assert!(harness.local.read(SOURCE, TAB).unwrap().is_none());
    assert_eq!(harness.scheduler.pending(), 0);

    harness.scheduler.advance(Duration::from_secs(1)).await;
    assert!(harness.remote.draft(SOURCE, TAB).is_none());
    assert_eq!(harness.remote.write_count(), 0);
}

#[tokio::test]
async fn failed_commit_keeps_drafts_and_can_retry() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    session.set_category(0, Category::Partner);
    harness.saved.set_failing_commits(true);

    let error = session.commit(harness.saved.as_ref()).await.unwrap_err();
    assert!(matches!(error, SessionError::Commit { .. }));
    assert!(!error.user_message().is_empty());
    assert!(harness.local.draft(SOURCE, TAB).is_some());

    harness.saved.set_failing_commits(false);
    assert!(session.commit(harness.saved.as_ref()).await.is_ok());
}

#[tokio::test]
async fn commit_before_load_is_rejected() {
    let harness = Harness::new();
    let mut session = harness.session();
    let error = session.commit(harness.saved.as_ref()).await.unwrap_err();
    assert!(matches!(error, SessionError::NotLoaded));
}

struct BrokenSource;

impl SheetSource for BrokenSource {
    async fn fetch(&self, _source_id: &str, _tab: &str) -> tabmap_session::Result<RawSheet> {
        Err(SessionError::remote("sheet fetch", "403"))
    }
}

#[tokio::test]
async fn sheet_load_failure_is_surfaced() {
    let harness = Harness::new();
    let mut session = harness.session();
    let error = session.load_from(&BrokenSource).await.unwrap_err();
    assert!(matches!(error, SessionError::SourceLoad { .. }));
    assert!(!session.is_loaded());
}

#[tokio::test]
async fn header_row_change_reseeds_columns() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;
    session.set_category(0, Category::Partner);

    session.change_header_row(1).unwrap();
    assert_eq!(session.store().header_row(), 1);
    assert_eq!(session.store().columns()[0].source_column, "Acme");
    assert_eq!(session.store().columns()[0].category, Category::Unclassified);
    assert!(session.undo());
    assert_eq!(session.store().columns()[0].category, Category::Partner);
}

#[tokio::test]
async fn undo_after_header_row_change_restores_the_old_header_row() {
    let harness = Harness::new();
    let mut session = harness.session();
    let titled = RawSheet::new(
        vec![
            row(&["Partner export", "", ""]),
            row(&["Brand", "Email", "ASIN"]),
            row(&["Acme", "ops@acme.io", "B000123"]),
        ],
        1,
        80,
    );
    session.load(titled).await;
    session.set_category(0, Category::Partner);

    session.change_header_row(0).unwrap();
    assert_eq!(session.store().columns()[0].source_column, "Partner export");

    assert!(session.undo());
    assert_eq!(session.store().header_row(), 1);
    let names: Vec<&str> = session
        .store()
        .columns()
        .iter()
        .map(|c| c.source_column.as_str())
        .collect();
    assert_eq!(names, vec!["Brand", "Email", "ASIN"]);
    assert_eq!(session.store().columns()[0].category, Category::Partner);

    let persisted = harness.local.draft(SOURCE, TAB).unwrap();
    assert_eq!(persisted.header_row, 1);
    assert_eq!(persisted.columns[0].source_column, "Brand");
}

#[tokio::test]
async fn bulk_suggestions_for_unknown_columns_leave_history_alone() {
    let harness = Harness::new();
    let mut session = harness.session();
    session.load(sheet()).await;

    let stray = IndexedSuggestion {
        index: 42,
        suggestion: Suggestion {
            category: Category::Staff,
            target_field: None,
            authority: Authority::default(),
            confidence: 0.9,
            is_key: false,
        },
    };
    assert_eq!(session.apply_suggestions_bulk(&[stray]), 0);
    assert!(session.history().is_empty());
    assert!(!session.undo());
}

//! A mapping session for one tab: reconciliation on load, edits with undo
//! history, draft persistence after every change, and the final commit.

use std::sync::Arc;

use tabmap_map::{AutoMatchReport, ClassificationStore, CommitRequest, History};
use tabmap_model::{
    Authority, Category, ComputedConfig, FieldSchema, IndexedSuggestion, Phase, RawSheet,
    Suggestion, SuggestionRequest,
};

use crate::backend::{
    CommitEndpoint, LocalDraftCache, RemoteDraftStore, SavedMappingStore, SheetSource,
    SuggestionService,
};
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::reconcile::{ReconcileGuard, Reconciled, Reconciler, RestoreSource};
use crate::scheduler::Scheduler;
use crate::sink::DraftSink;

/// Draft and mapping collaborators shared by a session.
#[derive(Debug)]
pub struct SessionBackends<L, R, M> {
    pub local: Arc<L>,
    pub remote: Arc<R>,
    pub saved: Arc<M>,
}

impl<L, R, M> Clone for SessionBackends<L, R, M> {
    fn clone(&self) -> Self {
        Self {
            local: Arc::clone(&self.local),
            remote: Arc::clone(&self.remote),
            saved: Arc::clone(&self.saved),
        }
    }
}

/// Classification workflow for one tab of one source.
pub struct MappingSession<L, R, M, S, C>
where
    L: LocalDraftCache,
    R: RemoteDraftStore,
    M: SavedMappingStore,
    S: Scheduler,
    C: Clock,
{
    source_id: String,
    tab: String,
    config: SessionConfig,
    store: ClassificationStore,
    history: History,
    sink: DraftSink<L, R, S>,
    reconciler: Reconciler<L, R, M>,
    guard: ReconcileGuard,
    clock: Arc<C>,
    sheet: Option<RawSheet>,
}

impl<L, R, M, S, C> MappingSession<L, R, M, S, C>
where
    L: LocalDraftCache,
    R: RemoteDraftStore,
    M: SavedMappingStore,
    S: Scheduler,
    C: Clock,
{
    pub fn new(
        source_id: impl Into<String>,
        tab: impl Into<String>,
        backends: SessionBackends<L, R, M>,
        scheduler: Arc<S>,
        clock: Arc<C>,
        config: SessionConfig,
    ) -> Self {
        let source_id = source_id.into();
        let tab = tab.into();
        let sink = DraftSink::new(
            source_id.clone(),
            tab.clone(),
            Arc::clone(&backends.local),
            Arc::clone(&backends.remote),
            scheduler,
            config.debounce(),
        );
        let reconciler = Reconciler::new(
            backends.local,
            backends.remote,
            backends.saved,
            config.draft_max_age_ms(),
        );
        Self {
            source_id,
            tab,
            history: History::new(config.history_capacity),
            config,
            store: ClassificationStore::new(),
            sink,
            reconciler,
            guard: ReconcileGuard::new(),
            clock,
            sheet: None,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn tab(&self) -> &str {
        &self.tab
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &ClassificationStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sheet(&self) -> Option<&RawSheet> {
        self.sheet.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.guard.is_done()
    }

    /// Outcome of the load, once it happened.
    pub fn restored(&self) -> Option<&Reconciled> {
        self.guard.outcome()
    }

    /// Reconciles the tab against `sheet` and initializes the store.
    ///
    /// Runs once per session. Later calls return the first outcome and
    /// leave the store alone, so a repeated load cannot clobber edits.
    pub async fn load(&mut self, sheet: RawSheet) -> RestoreSource {
        let now = self.clock.now_ms();
        let (outcome, ran) = self
            .guard
            .get_or_run(|| self.reconciler.run(&self.source_id, &self.tab, &sheet, now))
            .await;
        let source = outcome.source;
        if !ran {
            tracing::debug!(tab = %self.tab, "session already loaded");
            return source;
        }

        self.store
            .initialize(outcome.phase, outcome.header_row, outcome.columns.clone());
        self.history.clear();
        self.sheet = Some(sheet);
        self.sink.mark_ready();
        source
    }

    /// Fetches the tab from `source` and loads it.
    pub async fn load_from<T: SheetSource>(&mut self, source: &T) -> Result<RestoreSource> {
        if let Some(outcome) = self.guard.outcome() {
            return Ok(outcome.source);
        }
        let sheet = source
            .fetch(&self.source_id, &self.tab)
            .await
            .map_err(|error| SessionError::SourceLoad {
                source_id: self.source_id.clone(),
                tab: self.tab.clone(),
                message: error.to_string(),
            })?;
        Ok(self.load(sheet).await)
    }

    fn persist(&self) {
        self.sink.record(self.store.snapshot(self.clock.now_ms()));
    }

    fn persist_if(&self, changed: bool) -> bool {
        if changed {
            self.persist();
        }
        changed
    }

    /// Records an undo snapshot when `index` names a column.
    fn record_history_for(&mut self, index: usize) -> bool {
        if self.store.column(index).is_none() {
            return false;
        }
        self.history.record(&self.store);
        true
    }

    pub fn set_category(&mut self, index: usize, category: Category) -> bool {
        if !self.record_history_for(index) {
            return false;
        }
        let changed = self.store.set_category(index, category);
        self.persist_if(changed)
    }

    pub fn set_category_bulk(&mut self, indices: &[usize], category: Category) -> usize {
        if !indices.iter().any(|index| self.store.column(*index).is_some()) {
            return 0;
        }
        self.history.record(&self.store);
        let changed = self.store.set_category_bulk(indices, category);
        self.persist_if(changed > 0);
        changed
    }

    pub fn toggle_key(&mut self, index: usize) -> bool {
        let changed = self.store.toggle_key(index);
        self.persist_if(changed)
    }

    pub fn set_target_field(&mut self, index: usize, field: Option<String>) -> bool {
        let changed = self.store.set_target_field(index, field);
        self.persist_if(changed)
    }

    pub fn set_authority(&mut self, index: usize, authority: Authority) -> bool {
        let changed = self.store.set_authority(index, authority);
        self.persist_if(changed)
    }

    pub fn set_tags<I, T>(&mut self, index: usize, tag_ids: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let changed = self.store.set_tags(index, tag_ids);
        self.persist_if(changed)
    }

    pub fn set_computed_config(&mut self, index: usize, config: Option<ComputedConfig>) -> bool {
        let changed = self.store.set_computed_config(index, config);
        self.persist_if(changed)
    }

    /// Applies one suggestion. History is recorded when the category
    /// changes.
    pub fn apply_suggestion(&mut self, index: usize, suggestion: &Suggestion) -> bool {
        let Some(column) = self.store.column(index) else {
            return false;
        };
        if column.category != suggestion.category {
            self.history.record(&self.store);
        }
        let changed = self.store.apply_suggestion(index, suggestion);
        self.persist_if(changed)
    }

    pub fn apply_suggestions_bulk(&mut self, suggestions: &[IndexedSuggestion]) -> usize {
        if !suggestions
            .iter()
            .any(|entry| self.store.column(entry.index).is_some())
        {
            return 0;
        }
        self.history.record(&self.store);
        let applied = self.store.apply_suggestions_bulk(suggestions);
        self.persist_if(applied > 0);
        applied
    }

    /// Picks a different header row and re-seeds every column from it.
    pub fn change_header_row(&mut self, header_row: usize) -> Result<()> {
        let sheet = self.sheet.as_ref().ok_or(SessionError::NotLoaded)?;
        let headers = sheet.headers_at(header_row);
        self.history.record(&self.store);
        self.store.reinitialize_for_header_row(
            header_row,
            &headers,
            sheet.data_rows_after(header_row),
        );
        self.persist();
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.store);
        self.persist_if(undone)
    }

    /// Leaves the preview once the header row is confirmed.
    pub fn begin_classification(&mut self) -> bool {
        if self.store.phase() != Phase::Preview {
            return false;
        }
        let changed = self.store.set_phase(Phase::Classify);
        self.persist_if(changed)
    }

    /// Moves from classification to field mapping and auto-matches fields.
    ///
    /// Returns `None` unless the session is in the classify phase. History
    /// does not survive the transition.
    pub fn enter_map_phase(&mut self, schema: &FieldSchema) -> Option<AutoMatchReport> {
        if self.store.phase() != Phase::Classify {
            return None;
        }
        self.store.set_phase(Phase::Map);
        self.history.clear();
        let report = self.store.auto_match_fields(schema);
        tracing::info!(
            tab = %self.tab,
            assigned = report.assigned.len(),
            unmatched = report.unmatched.len(),
            "entered map phase"
        );
        self.persist();
        Some(report)
    }

    pub fn back_to_classify(&mut self) -> bool {
        if self.store.phase() != Phase::Map {
            return false;
        }
        let changed = self.store.set_phase(Phase::Classify);
        self.persist_if(changed)
    }

    /// Builds the request sent to the assistant for the column at `index`.
    pub fn suggestion_request(&self, index: usize) -> Option<SuggestionRequest> {
        let column = self.store.column(index)?;
        let sample_values = self
            .sheet
            .as_ref()
            .map(|sheet| {
                sheet.sample_values(
                    self.store.header_row(),
                    column.source_index,
                    self.config.suggestion_sample_size,
                )
            })
            .unwrap_or_default();
        let sibling_columns = self
            .store
            .columns()
            .iter()
            .filter(|other| other.source_index != column.source_index)
            .map(|other| other.source_column.clone())
            .collect();
        Some(SuggestionRequest {
            column_name: column.source_column.clone(),
            sample_values,
            sibling_columns,
            context: Some(self.tab.clone()),
        })
    }

    /// Asks `service` about each listed column and applies every answer in
    /// one undoable step. Failed requests are logged and skipped.
    pub async fn request_suggestions<T: SuggestionService>(
        &mut self,
        service: &T,
        indices: &[usize],
    ) -> usize {
        let mut suggestions = Vec::new();
        for &index in indices {
            let Some(request) = self.suggestion_request(index) else {
                continue;
            };
            match service.suggest(&request).await {
                Ok(suggestion) => suggestions.push(IndexedSuggestion { index, suggestion }),
                Err(error) => tracing::warn!(
                    index,
                    column = %request.column_name,
                    error = %error,
                    "suggestion request failed"
                ),
            }
        }
        self.apply_suggestions_bulk(&suggestions)
    }

    /// Sends the final mapping to `endpoint`. On success the drafts are
    /// deleted; on failure nothing changes and the commit can be retried.
    pub async fn commit<E: CommitEndpoint>(&mut self, endpoint: &E) -> Result<CommitRequest> {
        if !self.is_loaded() {
            return Err(SessionError::NotLoaded);
        }
        let request = CommitRequest::from_store(&self.store);
        endpoint
            .commit(&self.source_id, &self.tab, &request)
            .await
            .map_err(|error| match error {
                SessionError::Commit { .. } => error,
                other => SessionError::Commit {
                    message: other.to_string(),
                },
            })?;
        tracing::info!(
            source_id = %self.source_id,
            tab = %self.tab,
            columns = request.columns.len(),
            primary_entity = ?request.primary_entity,
            "mapping committed"
        );
        self.sink.complete().await;
        Ok(request)
    }

    /// Hands any pending draft to the remote store without waiting.
    pub fn close(&self) -> bool {
        self.sink.flush()
    }

    /// Writes any pending draft and waits for it.
    pub async fn settle(&self) -> bool {
        self.sink.settle().await
    }
}

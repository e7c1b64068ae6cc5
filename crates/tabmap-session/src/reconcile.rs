//! Draft reconciliation: decides where a tab's classification comes from
//! when it is opened.
//!
//! Priority: a committed mapping for the tab, then the newer of the remote
//! and local drafts within the freshness window (local on a tie), then a
//! fresh heuristic pass. The decision itself is [`reconcile`], a pure
//! function; [`Reconciler`] gathers its inputs and discards drafts that a
//! committed mapping made obsolete.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tabmap_map::{classify::seed_column, classify_emptiness, refresh_columns, seed_columns};
use tabmap_model::{
    ColumnClassification, DraftState, EntityType, Phase, RawSheet, SavedColumnMapping,
    SavedTabMapping, TimestampMs,
};

use crate::backend::{LocalDraftCache, RemoteDraftStore, SavedMappingStore};

/// Everything reconciliation may restore from. Absent inputs are `None`.
#[derive(Debug, Clone, Default)]
pub struct DraftCandidates {
    pub completed: Option<SavedTabMapping>,
    pub remote: Option<DraftState>,
    pub local: Option<DraftState>,
}

/// Where the initial classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    CompletedMapping,
    RemoteDraft,
    LocalDraft,
    Fresh,
}

impl RestoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompletedMapping => "completed mapping",
            Self::RemoteDraft => "remote draft",
            Self::LocalDraft => "local draft",
            Self::Fresh => "fresh",
        }
    }
}

impl fmt::Display for RestoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reconciliation, ready to initialize a store with.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub source: RestoreSource,
    pub phase: Phase,
    pub header_row: usize,
    pub columns: Vec<ColumnClassification>,
    /// Both drafts are obsolete and should be deleted.
    pub discard_drafts: bool,
    /// Saved rows that could not be restored.
    pub skipped_rows: usize,
    /// Restored columns switched to `Skip` because they are now empty.
    pub auto_skipped: usize,
}

/// Picks the initial classification for `sheet`.
pub fn reconcile(
    candidates: DraftCandidates,
    sheet: &RawSheet,
    now: TimestampMs,
    max_age_ms: i64,
) -> Reconciled {
    if let Some(mapping) = candidates
        .completed
        .filter(SavedTabMapping::has_rows)
    {
        return restore_completed(&mapping, sheet);
    }

    let usable = |draft: Option<DraftState>| {
        draft.filter(|d| d.has_columns() && d.is_fresh(now, max_age_ms))
    };
    let chosen = match (usable(candidates.remote), usable(candidates.local)) {
        (Some(remote), Some(local)) if remote.timestamp > local.timestamp => {
            Some((RestoreSource::RemoteDraft, remote))
        }
        (_, Some(local)) => Some((RestoreSource::LocalDraft, local)),
        (Some(remote), None) => Some((RestoreSource::RemoteDraft, remote)),
        (None, None) => None,
    };

    match chosen {
        Some((source, draft)) => restore_draft(source, draft, sheet),
        None => {
            let header_row = sheet.detected_header_row;
            Reconciled {
                source: RestoreSource::Fresh,
                phase: Phase::Preview,
                header_row,
                columns: seed_columns(
                    &sheet.headers_at(header_row),
                    sheet.data_rows_after(header_row),
                ),
                discard_drafts: false,
                skipped_rows: 0,
                auto_skipped: 0,
            }
        }
    }
}

fn restore_completed(mapping: &SavedTabMapping, sheet: &RawSheet) -> Reconciled {
    let header_row = mapping.header_row;
    let headers = sheet.headers_at(header_row);
    let data_rows = sheet.data_rows_after(header_row);

    let mut by_name: HashMap<&str, &SavedColumnMapping> = HashMap::new();
    for row in &mapping.column_mappings {
        by_name.entry(row.source_column.trim()).or_insert(row);
    }

    for error in &mapping.malformed_rows {
        tracing::warn!(tab = %mapping.tab, %error, "skipping unreadable saved mapping row");
    }
    let mut skipped_rows = mapping.malformed_rows.len();
    let mut columns: Vec<ColumnClassification> = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let Some(row) = by_name.get(header.as_str()) else {
                return seed_column(index, header, data_rows);
            };
            match row.to_classification(index, header) {
                Ok(mut column) => {
                    column.is_empty = classify_emptiness(index, data_rows);
                    column
                }
                Err(error) => {
                    tracing::warn!(
                        column = %header,
                        error = %error,
                        "skipping malformed saved mapping row"
                    );
                    skipped_rows += 1;
                    seed_column(index, header, data_rows)
                }
            }
        })
        .collect();
    enforce_key_rules(&mut columns);

    Reconciled {
        source: RestoreSource::CompletedMapping,
        phase: Phase::Classify,
        header_row,
        columns,
        discard_drafts: true,
        skipped_rows,
        auto_skipped: 0,
    }
}

fn restore_draft(source: RestoreSource, draft: DraftState, sheet: &RawSheet) -> Reconciled {
    let DraftState {
        phase,
        header_row,
        mut columns,
        ..
    } = draft;
    let auto_skipped = refresh_columns(
        &mut columns,
        &sheet.headers_at(header_row),
        sheet.data_rows_after(header_row),
    );
    enforce_key_rules(&mut columns);
    Reconciled {
        source,
        phase,
        header_row,
        columns,
        discard_drafts: false,
        skipped_rows: 0,
        auto_skipped,
    }
}

/// Drops keys on non-entity columns and every key after the first per
/// entity. Restored data may come from clients that did not enforce this.
fn enforce_key_rules(columns: &mut [ColumnClassification]) {
    let mut keyed: BTreeSet<EntityType> = BTreeSet::new();
    for column in columns.iter_mut().filter(|c| c.is_key) {
        match column.category.entity() {
            Some(entity) if keyed.insert(entity) => {}
            _ => {
                tracing::debug!(column = %column.source_column, "dropping restored key");
                column.is_key = false;
            }
        }
    }
}

/// Gathers reconciliation inputs from the draft stores and the saved
/// mapping store.
#[derive(Debug)]
pub struct Reconciler<L, R, M> {
    local: Arc<L>,
    remote: Arc<R>,
    saved: Arc<M>,
    max_age_ms: i64,
}

impl<L, R, M> Reconciler<L, R, M>
where
    L: LocalDraftCache,
    R: RemoteDraftStore,
    M: SavedMappingStore,
{
    pub fn new(local: Arc<L>, remote: Arc<R>, saved: Arc<M>, max_age_ms: i64) -> Self {
        Self {
            local,
            remote,
            saved,
            max_age_ms,
        }
    }

    /// Fetches every candidate. A failed fetch counts as absent.
    pub async fn gather(&self, source_id: &str, tab: &str) -> DraftCandidates {
        let (remote, saved) = tokio::join!(
            self.remote.get(source_id, tab),
            self.saved.get(source_id)
        );
        let remote = remote.unwrap_or_else(|error| {
            tracing::warn!(source_id, tab, error = %error, "remote draft fetch failed");
            None
        });
        let completed = match saved {
            Ok(tabs) => tabs.into_iter().find(|mapping| mapping.tab == tab),
            Err(error) => {
                tracing::warn!(source_id, tab, error = %error, "saved mapping fetch failed");
                None
            }
        };
        let local = self.local.read(source_id, tab).unwrap_or_else(|error| {
            tracing::warn!(source_id, tab, error = %error, "local draft read failed");
            None
        });
        DraftCandidates {
            completed,
            remote,
            local,
        }
    }

    /// Reconciles `sheet` and deletes drafts made obsolete by a committed
    /// mapping.
    pub async fn run(
        &self,
        source_id: &str,
        tab: &str,
        sheet: &RawSheet,
        now: TimestampMs,
    ) -> Reconciled {
        let candidates = self.gather(source_id, tab).await;
        let outcome = reconcile(candidates, sheet, now, self.max_age_ms);
        tracing::info!(
            source_id,
            tab,
            source = %outcome.source,
            columns = outcome.columns.len(),
            skipped_rows = outcome.skipped_rows,
            "reconciled classification"
        );
        if outcome.discard_drafts {
            self.discard(source_id, tab).await;
        }
        outcome
    }

    async fn discard(&self, source_id: &str, tab: &str) {
        if let Err(error) = self.local.remove(source_id, tab) {
            tracing::warn!(source_id, tab, error = %error, "failed to delete local draft");
        }
        if let Err(error) = self.remote.delete(source_id, tab).await {
            tracing::warn!(source_id, tab, error = %error, "failed to delete remote draft");
        }
    }
}

/// Runs reconciliation at most once per session.
#[derive(Debug, Default)]
pub struct ReconcileGuard {
    outcome: Option<Reconciled>,
}

impl ReconcileGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&Reconciled> {
        self.outcome.as_ref()
    }

    /// Returns the first outcome, running `run` only if none exists yet.
    /// The second element is true when `run` was called.
    pub async fn get_or_run<F, Fut>(&mut self, run: F) -> (&Reconciled, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Reconciled>,
    {
        let ran = self.outcome.is_none();
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => run().await,
        };
        (&*self.outcome.insert(outcome), ran)
    }
}

//! Work-in-progress snapshots of a mapping session.

use serde::{Deserialize, Serialize};

use crate::category::Phase;
use crate::column::ColumnClassification;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Snapshot of a classification store, persisted locally and remotely while
/// the user is still editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftState {
    pub phase: Phase,
    pub header_row: usize,
    pub columns: Vec<ColumnClassification>,
    pub timestamp: TimestampMs,
}

impl DraftState {
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// True when the draft is no older than `max_age_ms` at `now`.
    ///
    /// Drafts stamped in the future count as fresh.
    pub fn is_fresh(&self, now: TimestampMs, max_age_ms: i64) -> bool {
        now.saturating_sub(self.timestamp) <= max_age_ms
    }
}

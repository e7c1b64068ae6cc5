//! Session tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabmap_map::DEFAULT_HISTORY_CAPACITY;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Configuration for draft persistence and editing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay before a change is written to the remote draft store.
    /// Additional changes reset the timer.
    pub debounce_ms: u64,

    /// Drafts older than this are ignored on load.
    pub draft_max_age_days: u32,

    /// Number of undo snapshots kept.
    pub history_capacity: usize,

    /// Lifetime of cached raw sheet data.
    pub cache_ttl_secs: u64,

    /// Sample values sent with each suggestion request.
    pub suggestion_sample_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            draft_max_age_days: 7,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            cache_ttl_secs: 300,
            suggestion_sample_size: 5,
        }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn draft_max_age_ms(&self) -> i64 {
        i64::from(self.draft_max_age_days) * MS_PER_DAY
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

//! Bounded undo history over classification snapshots.

use std::collections::VecDeque;

use tabmap_model::ColumnClassification;

use crate::store::ClassificationStore;

/// Default number of snapshots kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Undo stack of full column sets, each paired with the header row it was
/// seeded from.
///
/// A snapshot is pushed before every bulk or category-changing edit. Field,
/// tag and authority edits are not recorded. When the stack is full the
/// oldest snapshot is dropped.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    header_row: usize,
    columns: Vec<ColumnClassification>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Records the store's current header row and columns.
    pub fn record(&mut self, store: &ClassificationStore) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(Snapshot {
            header_row: store.header_row(),
            columns: store.columns().to_vec(),
        });
    }

    /// Restores the most recent snapshot into `store`. Returns false when
    /// there is nothing to undo.
    pub fn undo(&mut self, store: &mut ClassificationStore) -> bool {
        match self.snapshots.pop_back() {
            Some(snapshot) => {
                store.restore_layout(snapshot.header_row, snapshot.columns);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

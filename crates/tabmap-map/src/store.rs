//! The classification store: the single owner of the live column records.
//!
//! Every mutation takes `&mut self` and completes before returning, so no
//! reader can observe a column set that violates the key rules:
//!
//! - at most one key column per entity category;
//! - a category change drops key, target field, computed config and AI
//!   provenance;
//! - only entity columns may be keys.
//!
//! Indices outside the current column set are ignored rather than rejected:
//! a late UI event can race with a reconciliation that replaced the columns.

use std::collections::{BTreeMap, BTreeSet};

use tabmap_model::{
    Authority, Category, ColumnClassification, ComputedConfig, DraftState, EntityType,
    FieldSchema, IndexedSuggestion, Phase, Suggestion, TimestampMs,
};

use crate::automatch::{AutoMatchReport, auto_match};
use crate::classify::{refresh_columns, seed_columns};

/// Column classifications plus workflow position for one tab.
#[derive(Debug, Clone, Default)]
pub struct ClassificationStore {
    phase: Phase,
    header_row: usize,
    columns: Vec<ColumnClassification>,
    revision: u64,
}

impl ClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a draft snapshot.
    pub fn from_draft(draft: DraftState) -> Self {
        Self {
            phase: draft.phase,
            header_row: draft.header_row,
            columns: draft.columns,
            revision: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn columns(&self) -> &[ColumnClassification] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnClassification> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Incremented on every applied mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Owned copy of the current state stamped with `timestamp`.
    pub fn snapshot(&self, timestamp: TimestampMs) -> DraftState {
        DraftState {
            phase: self.phase,
            header_row: self.header_row,
            columns: self.columns.clone(),
            timestamp,
        }
    }

    /// Column currently holding the key for `entity`.
    pub fn key_holder(&self, entity: EntityType) -> Option<&ColumnClassification> {
        self.columns
            .iter()
            .find(|c| c.is_key && c.category.entity() == Some(entity))
    }

    fn touch(&mut self) -> bool {
        self.revision += 1;
        true
    }

    pub fn set_phase(&mut self, phase: Phase) -> bool {
        if self.phase == phase {
            return false;
        }
        self.phase = phase;
        self.touch()
    }

    /// Replaces the whole column set. Used by draft restore.
    pub fn replace_columns(&mut self, columns: Vec<ColumnClassification>) {
        self.columns = columns;
        self.touch();
    }

    /// Puts back a header row together with the columns seeded from it.
    /// Used by undo.
    pub fn restore_layout(&mut self, header_row: usize, columns: Vec<ColumnClassification>) {
        self.header_row = header_row;
        self.replace_columns(columns);
    }

    /// Restores header row and columns in one step.
    pub fn initialize(&mut self, phase: Phase, header_row: usize, columns: Vec<ColumnClassification>) {
        self.phase = phase;
        self.header_row = header_row;
        self.columns = columns;
        self.touch();
    }

    pub fn set_category(&mut self, index: usize, category: Category) -> bool {
        let Some(column) = self.columns.get_mut(index) else {
            return false;
        };
        column.reset_for_category(category);
        self.touch()
    }

    /// Applies [`Self::set_category`] to every listed index in one step.
    /// Returns the number of columns changed.
    pub fn set_category_bulk(&mut self, indices: &[usize], category: Category) -> usize {
        let targets: BTreeSet<usize> = indices.iter().copied().collect();
        let mut changed = 0;
        for index in targets {
            if let Some(column) = self.columns.get_mut(index) {
                column.reset_for_category(category);
                changed += 1;
            }
        }
        if changed > 0 {
            self.touch();
        }
        changed
    }

    /// Flips the key flag. Granting a key revokes it from any other column
    /// of the same category. Non-entity columns are left untouched.
    pub fn toggle_key(&mut self, index: usize) -> bool {
        let Some(column) = self.columns.get(index) else {
            return false;
        };
        let category = column.category;
        if !category.is_keyable() {
            return false;
        }
        let granting = !column.is_key;
        if granting {
            for (other_index, other) in self.columns.iter_mut().enumerate() {
                if other_index != index && other.is_key && other.category == category {
                    tracing::debug!(
                        from = other_index,
                        to = index,
                        %category,
                        "key moved to another column"
                    );
                    other.is_key = false;
                }
            }
        }
        let column = &mut self.columns[index];
        column.is_key = granting;
        column.clear_ai_provenance();
        self.touch()
    }

    /// Sets or clears the target field. A field can only be set on entity
    /// columns.
    pub fn set_target_field(&mut self, index: usize, field: Option<String>) -> bool {
        let Some(column) = self.columns.get_mut(index) else {
            return false;
        };
        if field.is_some() && !column.category.is_entity() {
            return false;
        }
        column.target_field = field;
        column.clear_ai_provenance();
        self.touch()
    }

    pub fn set_authority(&mut self, index: usize, authority: Authority) -> bool {
        let Some(column) = self.columns.get_mut(index) else {
            return false;
        };
        column.authority = authority;
        column.clear_ai_provenance();
        self.touch()
    }

    pub fn set_tags<I, S>(&mut self, index: usize, tag_ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(column) = self.columns.get_mut(index) else {
            return false;
        };
        column.tag_ids = tag_ids.into_iter().map(Into::into).collect();
        column.clear_ai_provenance();
        self.touch()
    }

    /// Sets the computation of a computed column. Other columns never carry
    /// a config, so the call is ignored for them.
    pub fn set_computed_config(&mut self, index: usize, config: Option<ComputedConfig>) -> bool {
        let Some(column) = self.columns.get_mut(index) else {
            return false;
        };
        if config.is_some() && column.category != Category::Computed {
            return false;
        }
        column.computed_config = config;
        column.clear_ai_provenance();
        self.touch()
    }

    /// Applies an assistant suggestion. The suggested key flag is ignored:
    /// keys are only ever granted through [`Self::toggle_key`].
    pub fn apply_suggestion(&mut self, index: usize, suggestion: &Suggestion) -> bool {
        let Some(column) = self.columns.get_mut(index) else {
            return false;
        };
        apply_to_column(column, suggestion);
        self.touch()
    }

    /// Applies many suggestions in one step, skipping unknown indices.
    /// Returns the number applied.
    pub fn apply_suggestions_bulk(&mut self, suggestions: &[IndexedSuggestion]) -> usize {
        let mut applied = 0;
        for entry in suggestions {
            match self.columns.get_mut(entry.index) {
                Some(column) => {
                    apply_to_column(column, &entry.suggestion);
                    applied += 1;
                }
                None => tracing::debug!(index = entry.index, "suggestion for unknown column"),
            }
        }
        if applied > 0 {
            self.touch();
        }
        applied
    }

    /// Discards every classification and re-seeds from `headers`.
    pub fn reinitialize_for_header_row(
        &mut self,
        header_row: usize,
        headers: &[String],
        data_rows: &[Vec<String>],
    ) {
        tracing::info!(header_row, columns = headers.len(), "re-seeding classifications");
        self.header_row = header_row;
        self.columns = seed_columns(headers, data_rows);
        self.touch();
    }

    /// Refreshes column names and emptiness from the live header row without
    /// touching classifications. Returns the number of columns auto-skipped.
    pub fn refresh_headers(&mut self, headers: &[String], data_rows: &[Vec<String>]) -> usize {
        let skipped = refresh_columns(&mut self.columns, headers, data_rows);
        self.touch();
        skipped
    }

    /// Fills unset target fields from `schema`. See [`auto_match`].
    pub fn auto_match_fields(&mut self, schema: &FieldSchema) -> AutoMatchReport {
        let report = auto_match(&self.columns, schema);
        for assignment in &report.assigned {
            if let Some(column) = self.columns.get_mut(assignment.index) {
                column.target_field = Some(assignment.field.clone());
            }
        }
        if !report.assigned.is_empty() {
            self.touch();
        }
        report
    }

    pub fn summary(&self) -> StoreSummary {
        let mut by_category = BTreeMap::new();
        for column in &self.columns {
            *by_category.entry(column.category).or_insert(0) += 1;
        }
        StoreSummary {
            total: self.columns.len(),
            unclassified: by_category
                .get(&Category::Unclassified)
                .copied()
                .unwrap_or(0),
            by_category,
            keys: EntityType::ALL
                .into_iter()
                .filter_map(|entity| self.key_holder(entity).map(|c| (entity, c.source_index)))
                .collect(),
            mapped: self.columns.iter().filter(|c| c.is_mapped()).count(),
            ai_suggested: self.columns.iter().filter(|c| c.ai_suggested).count(),
        }
    }
}

fn apply_to_column(column: &mut ColumnClassification, suggestion: &Suggestion) {
    column.reset_for_category(suggestion.category);
    column.target_field = if suggestion.category.is_entity() {
        suggestion.target_field.clone()
    } else {
        None
    };
    column.authority = suggestion.authority;
    column.ai_suggested = true;
    column.ai_confidence = suggestion.confidence.clamp(0.0, 1.0);
}

/// Counts over the current column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub total: usize,
    pub unclassified: usize,
    pub by_category: BTreeMap<Category, usize>,
    /// Key column index per entity.
    pub keys: BTreeMap<EntityType, usize>,
    pub mapped: usize,
    pub ai_suggested: usize,
}

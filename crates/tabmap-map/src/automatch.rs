//! Field auto-matching for the transition into the map phase.
//!
//! Columns are visited in positional order. Each entity column without a
//! target field claims the first schema field whose normalized label, name
//! or alias equals the column's normalized name. Fields set by the user are
//! reserved up front, and a field claimed earlier in the pass is never handed
//! out twice, so no two columns of one entity share a target field.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rapidfuzz::distance::jaro_winkler::similarity as jaro_similarity;
use tabmap_model::{ColumnClassification, EntityType, FieldDefinition, FieldSchema};

use crate::utils::{normalize_key, normalize_text};

/// A target field assigned by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub index: usize,
    pub entity: EntityType,
    pub field: String,
}

/// Outcome of one auto-match pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoMatchReport {
    pub assigned: Vec<FieldAssignment>,
    /// Entity columns still without a target field.
    pub unmatched: Vec<usize>,
}

/// Computes target field assignments for unmapped entity columns.
///
/// `columns` is only read; the caller applies [`AutoMatchReport::assigned`].
pub fn auto_match(columns: &[ColumnClassification], schema: &FieldSchema) -> AutoMatchReport {
    let mut claimed: BTreeMap<EntityType, BTreeSet<String>> = BTreeMap::new();
    for column in columns {
        if let (Some(entity), Some(field)) = (column.category.entity(), &column.target_field) {
            claimed.entry(entity).or_default().insert(field.clone());
        }
    }

    let mut report = AutoMatchReport::default();
    for (index, column) in columns.iter().enumerate() {
        let Some(entity) = column.category.entity() else {
            continue;
        };
        if column.target_field.is_some() {
            continue;
        }
        let key = normalize_key(&column.source_column);
        let taken = claimed.entry(entity).or_default();
        let found = if key.is_empty() {
            None
        } else {
            schema
                .fields_for(entity)
                .iter()
                .find(|field| !taken.contains(&field.name) && field_matches(field, &key))
        };
        match found {
            Some(field) => {
                tracing::debug!(
                    index,
                    column = %column.source_column,
                    field = %field.name,
                    %entity,
                    "auto-matched field"
                );
                taken.insert(field.name.clone());
                report.assigned.push(FieldAssignment {
                    index,
                    entity,
                    field: field.name.clone(),
                });
            }
            None => report.unmatched.push(index),
        }
    }
    report
}

fn field_matches(field: &FieldDefinition, key: &str) -> bool {
    normalize_key(&field.label) == key
        || normalize_key(&field.name) == key
        || field.aliases.iter().any(|alias| normalize_key(alias) == key)
}

/// A field ranked by name similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHint<'a> {
    pub field: &'a FieldDefinition,
    pub score: f64,
}

/// Ranks `fields` by Jaro-Winkler similarity to `column_name`, best first.
///
/// Each field scores the best of its label, name and aliases. Hints are for
/// display; the matcher never assigns them.
pub fn closest_fields<'a>(
    column_name: &str,
    fields: &'a [FieldDefinition],
    limit: usize,
) -> Vec<FieldHint<'a>> {
    let column = normalize_text(column_name);
    if column.is_empty() {
        return Vec::new();
    }
    let mut hints: Vec<FieldHint<'a>> = fields
        .iter()
        .map(|field| {
            let score = std::iter::once(field.label.as_str())
                .chain(std::iter::once(field.name.as_str()))
                .chain(field.aliases.iter().map(String::as_str))
                .map(|candidate| jaro_similarity(column.chars(), normalize_text(candidate).chars()))
                .fold(0.0_f64, f64::max);
            FieldHint { field, score }
        })
        .collect();
    hints.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hints.truncate(limit);
    hints
}

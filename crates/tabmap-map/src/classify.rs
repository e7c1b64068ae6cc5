//! Name and content heuristics that seed a fresh classification.
//!
//! Everything here is pure: the same headers and rows always produce the
//! same columns, so stale drafts can be re-evaluated safely.

use std::sync::LazyLock;

use regex::Regex;
use tabmap_model::{Category, ColumnClassification};

/// Week-style headers: `W12 ...`, `3/14`, `2024-03-14`.
static WEEKLY_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^w\d+\s").expect("invalid week number regex"),
        Regex::new(r"^\d{1,2}/\d{1,2}").expect("invalid month/day regex"),
        Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("invalid ISO date regex"),
    ]
});

/// Category implied by the column name alone.
pub fn classify_by_name(name: &str) -> Option<Category> {
    let lower = name.to_lowercase();
    if lower.contains("weekly") || lower.contains("week ") {
        return Some(Category::Weekly);
    }
    if WEEKLY_PATTERNS.iter().any(|re| re.is_match(&lower)) {
        return Some(Category::Weekly);
    }
    None
}

/// True when every row is blank at `index`. Zero rows count as empty.
pub fn classify_emptiness(index: usize, data_rows: &[Vec<String>]) -> bool {
    data_rows
        .iter()
        .all(|row| row.get(index).is_none_or(|value| value.trim().is_empty()))
}

/// Default category: weekly by name, otherwise skip when empty.
pub fn default_category(name: &str, index: usize, data_rows: &[Vec<String>]) -> Category {
    if let Some(category) = classify_by_name(name) {
        return category;
    }
    if classify_emptiness(index, data_rows) {
        return Category::Skip;
    }
    Category::Unclassified
}

/// Builds a freshly classified column for each header.
pub fn seed_columns(headers: &[String], data_rows: &[Vec<String>]) -> Vec<ColumnClassification> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| seed_column(index, header, data_rows))
        .collect()
}

pub fn seed_column(index: usize, header: &str, data_rows: &[Vec<String>]) -> ColumnClassification {
    let mut column = ColumnClassification::new(index, header.trim())
        .with_category(default_category(header, index, data_rows));
    column.is_empty = classify_emptiness(index, data_rows);
    column
}

/// Brings restored columns in line with the live header row.
///
/// Names are refreshed by position and `is_empty` is recomputed; a column
/// that is empty and still unclassified becomes `Skip`. Headers with no
/// restored column are seeded. Returns the number of columns auto-skipped.
pub fn refresh_columns(
    columns: &mut Vec<ColumnClassification>,
    headers: &[String],
    data_rows: &[Vec<String>],
) -> usize {
    let mut skipped = 0;
    for column in columns.iter_mut() {
        if let Some(header) = headers.get(column.source_index) {
            column.source_column = header.trim().to_string();
        }
        column.is_empty = classify_emptiness(column.source_index, data_rows);
        if column.is_empty && column.category == Category::Unclassified {
            column.category = Category::Skip;
            skipped += 1;
        }
    }

    let missing: Vec<usize> = (0..headers.len())
        .filter(|index| !columns.iter().any(|c| c.source_index == *index))
        .collect();
    if !missing.is_empty() {
        for index in missing {
            columns.push(seed_column(index, &headers[index], data_rows));
        }
        columns.sort_by_key(|c| c.source_index);
    }
    skipped
}

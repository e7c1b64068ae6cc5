//! Per-column classification records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::{Authority, Category};

/// Aggregation applied by a computed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Sum,
    Average,
    Count,
    Min,
    Max,
}

/// How a computed column derives its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComputedConfig {
    Formula {
        expression: String,
    },
    Aggregation {
        function: AggregationFunction,
        source_columns: Vec<String>,
    },
    Lookup {
        source_column: String,
        table: String,
        match_field: String,
        return_field: String,
    },
    Custom {
        description: String,
    },
}

/// Classification of one source column, identified by its position in the
/// header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnClassification {
    pub source_index: usize,
    pub source_column: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub authority: Authority,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default)]
    pub tag_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_config: Option<ComputedConfig>,
    #[serde(default)]
    pub ai_suggested: bool,
    #[serde(default)]
    pub ai_confidence: f32,
    /// True when every sampled data row is blank in this column.
    #[serde(default)]
    pub is_empty: bool,
}

impl ColumnClassification {
    /// Creates an unclassified column.
    pub fn new(source_index: usize, source_column: impl Into<String>) -> Self {
        Self {
            source_index,
            source_column: source_column.into(),
            category: Category::Unclassified,
            target_field: None,
            authority: Authority::default(),
            is_key: false,
            tag_ids: BTreeSet::new(),
            computed_config: None,
            ai_suggested: false,
            ai_confidence: 0.0,
            is_empty: false,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Changes the category and drops every field that depends on it.
    pub fn reset_for_category(&mut self, category: Category) {
        self.category = category;
        self.is_key = false;
        self.target_field = None;
        self.computed_config = None;
        self.clear_ai_provenance();
    }

    pub fn clear_ai_provenance(&mut self) {
        self.ai_suggested = false;
        self.ai_confidence = 0.0;
    }

    /// Entity column with a mapped target field.
    pub fn is_mapped(&self) -> bool {
        self.category.is_entity() && self.target_field.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_dependent_state() {
        let mut column = ColumnClassification::new(0, "Email").with_category(Category::Staff);
        column.is_key = true;
        column.target_field = Some("email".to_string());
        column.ai_suggested = true;
        column.ai_confidence = 0.8;

        column.reset_for_category(Category::Partner);

        assert_eq!(column.category, Category::Partner);
        assert!(!column.is_key);
        assert!(column.target_field.is_none());
        assert!(!column.ai_suggested);
        assert_eq!(column.ai_confidence, 0.0);
    }

    #[test]
    fn computed_config_is_tagged_by_kind() {
        let config = ComputedConfig::Aggregation {
            function: AggregationFunction::Sum,
            source_columns: vec!["W1".to_string(), "W2".to_string()],
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["kind"], "aggregation");
        assert_eq!(value["function"], "sum");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let column: ColumnClassification =
            serde_json::from_str(r#"{"source_index": 3, "source_column": "Notes"}"#).unwrap();
        assert_eq!(column.category, Category::Unclassified);
        assert_eq!(column.authority, Authority::SourceOfTruth);
        assert!(column.tag_ids.is_empty());
    }
}

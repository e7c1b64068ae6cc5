//! Suggestions returned by the classification assistant.

use serde::{Deserialize, Serialize};

use crate::category::{Authority, Category};

/// Category and field guess for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: Category,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub authority: Authority,
    pub confidence: f32,
    /// Reported by the service but never applied; keys are granted manually.
    #[serde(default)]
    pub is_key: bool,
}

/// Suggestion bound to a column position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSuggestion {
    pub index: usize,
    pub suggestion: Suggestion,
}

/// Input for one suggestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub column_name: String,
    pub sample_values: Vec<String>,
    pub sibling_columns: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

//! Previously committed tab mappings.
//!
//! A mapping written by an older or foreign client may contain rows this
//! crate cannot read. Rows are parsed one at a time: a row that does not fit
//! [`SavedColumnMapping`] is set aside in
//! [`SavedTabMapping::malformed_rows`], and `category`/`authority` stay raw
//! strings so unknown values are caught per row on restore as well.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::{Authority, Category};
use crate::column::ColumnClassification;
use crate::error::Result;

/// One committed column mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedColumnMapping {
    pub source_column: String,
    /// Informational; restore matches columns by name.
    #[serde(default)]
    pub source_column_index: usize,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SavedColumnMapping {
    /// Builds the persisted form of a classification.
    pub fn from_classification(column: &ColumnClassification) -> Self {
        Self {
            source_column: column.source_column.clone(),
            source_column_index: column.source_index,
            category: column.category.as_str().map(str::to_string),
            target_field: column.target_field.clone(),
            authority: Some(column.authority.as_str().to_string()),
            is_key: column.is_key,
            tags: column.tag_ids.iter().cloned().collect(),
        }
    }

    pub fn parsed_category(&self) -> Result<Category> {
        Category::parse_optional(self.category.as_deref())
    }

    pub fn parsed_authority(&self) -> Result<Authority> {
        match self.authority.as_deref().map(str::trim) {
            None | Some("") => Ok(Authority::default()),
            Some(raw) => raw.parse(),
        }
    }

    /// Rebuilds a classification at `source_index` with `source_column` as the
    /// display name.
    ///
    /// Keys are only restored for entity categories.
    pub fn to_classification(
        &self,
        source_index: usize,
        source_column: &str,
    ) -> Result<ColumnClassification> {
        let category = self.parsed_category()?;
        let authority = self.parsed_authority()?;
        let mut column = ColumnClassification::new(source_index, source_column);
        column.category = category;
        column.authority = authority;
        column.is_key = self.is_key && category.is_keyable();
        column.target_field = if category.is_entity() {
            self.target_field.clone().filter(|f| !f.trim().is_empty())
        } else {
            None
        };
        column.tag_ids = self.tags.iter().cloned().collect::<BTreeSet<_>>();
        Ok(column)
    }
}

/// Committed mapping for one tab of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTabMapping")]
pub struct SavedTabMapping {
    pub tab: String,
    pub header_row: usize,
    pub column_mappings: Vec<SavedColumnMapping>,
    /// Parse errors of rows that could not be read. Never written back.
    #[serde(skip)]
    pub malformed_rows: Vec<String>,
}

impl SavedTabMapping {
    pub fn new(
        tab: impl Into<String>,
        header_row: usize,
        column_mappings: Vec<SavedColumnMapping>,
    ) -> Self {
        Self {
            tab: tab.into(),
            header_row,
            column_mappings,
            malformed_rows: Vec::new(),
        }
    }

    /// True when the commit listed any rows, readable or not.
    pub fn has_rows(&self) -> bool {
        !self.column_mappings.is_empty() || !self.malformed_rows.is_empty()
    }
}

/// Wire shape with rows left unparsed.
#[derive(Deserialize)]
struct RawTabMapping {
    tab: String,
    header_row: usize,
    #[serde(default)]
    column_mappings: Vec<serde_json::Value>,
}

impl From<RawTabMapping> for SavedTabMapping {
    fn from(raw: RawTabMapping) -> Self {
        let mut mapping = Self::new(raw.tab, raw.header_row, Vec::new());
        for row in raw.column_mappings {
            match serde_json::from_value::<SavedColumnMapping>(row) {
                Ok(row) => mapping.column_mappings.push(row),
                Err(error) => mapping.malformed_rows.push(error.to_string()),
            }
        }
        mapping
    }
}

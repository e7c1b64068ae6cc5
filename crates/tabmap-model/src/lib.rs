//! Data model for classifying spreadsheet columns and mapping them onto
//! entity field schemas.

pub mod category;
pub mod column;
pub mod draft;
pub mod error;
pub mod saved;
pub mod schema;
pub mod sheet;
pub mod suggestion;

pub use category::{Authority, Category, EntityType, Phase};
pub use column::{AggregationFunction, ColumnClassification, ComputedConfig};
pub use draft::{DraftState, TimestampMs};
pub use error::{ModelError, Result};
pub use saved::{SavedColumnMapping, SavedTabMapping};
pub use schema::{FieldDefinition, FieldSchema};
pub use sheet::RawSheet;
pub use suggestion::{IndexedSuggestion, Suggestion, SuggestionRequest};

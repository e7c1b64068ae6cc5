//! Column classification engine: heuristics, the classification store, undo
//! history, field auto-matching and the commit payload.

pub mod automatch;
pub mod classify;
pub mod commit;
pub mod history;
pub mod store;
pub mod utils;

pub use automatch::{AutoMatchReport, FieldAssignment, FieldHint, auto_match, closest_fields};
pub use classify::{
    classify_by_name, classify_emptiness, default_category, refresh_columns, seed_columns,
};
pub use commit::{CommitRequest, primary_entity};
pub use history::{DEFAULT_HISTORY_CAPACITY, History};
pub use store::{ClassificationStore, StoreSummary};

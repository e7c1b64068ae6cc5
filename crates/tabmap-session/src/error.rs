//! Session error types.
//!
//! Only sheet loading and commit failures reach the user; draft and
//! suggestion failures are logged and absorbed by the session.

use std::path::PathBuf;
use thiserror::Error;

/// Session operation error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// File I/O error.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Draft or mapping (de)serialization error.
    #[error("Failed to (de)serialize {what}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A remote collaborator failed.
    #[error("Remote {operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    /// The sheet could not be loaded.
    #[error("Failed to load sheet {source_id}/{tab}: {message}")]
    SourceLoad {
        source_id: String,
        tab: String,
        message: String,
    },

    /// The commit endpoint rejected the mapping.
    #[error("Failed to commit mapping: {message}")]
    Commit { message: String },

    /// An operation needed a loaded sheet.
    #[error("Session has not been loaded")]
    NotLoaded,
}

impl SessionError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            message: message.into(),
        }
    }

    /// Whether the workflow can continue after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Io { .. })
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                operation, path, ..
            } => format!("Could not {} the file at {}", operation, path.display()),
            Self::Serialization { what, .. } => {
                format!("The saved {what} could not be read. It may be corrupted.")
            }
            Self::Remote { operation, .. } => {
                format!("The server did not respond to the {operation} request.")
            }
            Self::SourceLoad { tab, .. } => {
                format!("The tab '{tab}' could not be loaded. Please try again.")
            }
            Self::Commit { .. } => "The mapping could not be saved. Please try again.".to_string(),
            Self::NotLoaded => "Load a sheet before editing its mapping.".to_string(),
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

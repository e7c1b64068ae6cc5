use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("unknown authority: {0}")]
    UnknownAuthority(String),
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
    #[error("invalid field schema: {0}")]
    Schema(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

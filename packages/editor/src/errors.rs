//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Document error: {0}")]
    Document(#[from] anvil_blocks::DocumentError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] crate::persistence::PersistenceError),

    #[error("Invalid sanitizer pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type EditorResult<T> = Result<T, EditorError>;

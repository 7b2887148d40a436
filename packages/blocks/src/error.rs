use thiserror::Error;

/// Errors raised while reading a block tree
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON array of blocks, found {found}")]
    NotAnArray { found: &'static str },
}

/// Errors raised while reading block type registry data
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registry data: {0}")]
    Json(#[from] serde_json::Error),
}

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No result with id {0}")]
    NotFound(String),

    #[error("Result already exists: {0}")]
    AlreadyExists(String),
}

// Error types for the satchel library.
// Covers token persistence, crypto failures, and storage resolution errors.

use thiserror::Error;

use crate::tokens::Provider;

#[derive(Error, Debug)]
pub enum SatchelError {
    #[error("failed to save {provider} credentials: {reason}")]
    TokenPersistence { provider: Provider, reason: String },

    #[error("encryption error: {0}")]
    Crypto(String),

    #[error("invalid master key: {0}")]
    InvalidKey(String),

    #[error("no usable data directory for token storage")]
    MissingStorageDir,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SatchelError>;

//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Stored payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Invalid timestamp in stored record: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}

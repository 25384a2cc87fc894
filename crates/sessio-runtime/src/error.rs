//! Runtime error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Storage error: {0}")]
    Storage(#[from] sessio_storage::StorageError),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sessions are disabled")]
    Disabled,

    #[error("Session is already active")]
    AlreadyActive,

    #[error("Session is not active")]
    NotActive,

    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("Session ids may only be supplied by cookie")]
    UrlTransportRejected,
}

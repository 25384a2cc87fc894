//! Session error types

use thiserror::Error;

use sessio_runtime::RuntimeError;
use sessio_storage::StorageError;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The session cannot be configured this way in its current state
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation is not valid for the current lifecycle state
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Opening the session failed part-way; nothing was opened
    #[error("Failed to open session: {0}")]
    Open(#[source] Box<SessionError>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Runtime error: {0}")]
    Runtime(#[source] RuntimeError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// The storage failure behind this error, looking through `Open`.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            SessionError::Storage(e) => Some(e),
            SessionError::Open(inner) => inner.storage_error(),
            _ => None,
        }
    }
}

impl From<RuntimeError> for SessionError {
    fn from(error: RuntimeError) -> Self {
        match error {
            RuntimeError::Storage(e) => SessionError::Storage(e),
            other => SessionError::Runtime(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_storage_errors_are_flattened() {
        let storage = StorageError::InvalidTableName("x y".to_string());
        let error = SessionError::from(RuntimeError::Storage(storage));
        assert!(matches!(error, SessionError::Storage(_)));

        let wrapped = SessionError::Open(Box::new(error));
        assert!(matches!(
            wrapped.storage_error(),
            Some(StorageError::InvalidTableName(_))
        ));

        let error = SessionError::from(RuntimeError::NotActive);
        assert!(matches!(error, SessionError::Runtime(RuntimeError::NotActive)));
        assert!(error.storage_error().is_none());
    }
}

//! Sessio Storage Layer
//!
//! SQLite-backed persistence shared by the session save handlers.
//! The connection is guarded by a mutex so every statement runs atomically
//! with respect to other handles cloned from the same `Database`.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;
pub use migrations::{ensure_session_table, DEFAULT_TABLE_NAME};

pub type Result<T> = std::result::Result<T, StorageError>;

//! Sessio Core
//!
//! Lifecycle controller for web sessions. A [`Session`] drives a
//! [`SessionRuntime`] through open/close/destroy/restart, keeps its own state
//! in a reserved namespace of the runtime payload, and delivers one-shot
//! flash messages on the open following the one they were set in.

mod config;
mod error;
mod flash;
mod params;
mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use flash::Flash;
pub use params::SessionParams;
pub use session::{Session, EVENT_CLOSE, EVENT_DESTROY, EVENT_OPEN, KEY_FLASH, KEY_NAMESPACE};

// Re-export collaborators
pub use sessio_events::{Event, Phase, Publisher};
pub use sessio_handler::{MemoryHandler, SaveHandler, SessionRecord, SqlHandler};
pub use sessio_runtime::{
    CookieParams, HandlerRuntime, IdHash, IdPolicy, IdTransport, RuntimeError, SessionRuntime,
    SessionStatus,
};
pub use sessio_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, SessionError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}

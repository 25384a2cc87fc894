//! Sessio Save Handlers
//!
//! A save handler is the persistence backend a session runtime delegates to.
//! Every handler maps an opaque session id to a byte payload with
//! `created`/`modified` timestamps and supports bulk expiry.

mod clock;
mod memory;
mod record;
mod sql;

pub use clock::{Clock, FixedClock, SystemClock};
pub use memory::MemoryHandler;
pub use record::SessionRecord;
pub use sql::SqlHandler;

pub use sessio_storage::{Result, StorageError};

/// Persistence capability set consumed by a session runtime.
///
/// Absent ids are never errors: `read` yields an empty payload and `destroy`
/// is a no-op. Storage failures are returned as-is; handlers never retry.
pub trait SaveHandler: Send + Sync {
    /// Called when the runtime starts a session. No-op by default.
    fn open(&self, _save_path: &str, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Called when the runtime finishes with a session. No-op by default.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Insert or update the payload for `id` in a single atomic step.
    fn write(&self, id: &str, data: &[u8]) -> Result<()>;

    fn destroy(&self, id: &str) -> Result<()>;

    /// Delete every record whose `modified` is at or before `now - lifetime`.
    /// Returns how many records were removed.
    fn gc(&self, lifetime: u64) -> Result<usize>;
}

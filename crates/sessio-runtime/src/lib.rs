//! Sessio Runtime
//!
//! The session runtime owns the mechanics a lifecycle controller drives:
//! id allocation, starting and closing a session, and shuttling the payload
//! to and from a registered [`SaveHandler`]. [`HandlerRuntime`] is the
//! in-process implementation; hosts with their own session machinery
//! implement [`SessionRuntime`] directly.

mod cookie;
mod error;
mod handler_runtime;
mod id;
mod status;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use cookie::CookieParams;
pub use error::RuntimeError;
pub use handler_runtime::{
    HandlerRuntime, DEFAULT_CACHE_EXPIRE, DEFAULT_CACHE_LIMITER, DEFAULT_GC_MAX_LIFETIME,
    DEFAULT_NAME,
};
pub use id::{generate_id, validate_id, IdHash, IdPolicy, IdTransport};
pub use sessio_handler::SaveHandler;
pub use status::SessionStatus;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Live session payload. Shared between the runtime and any view bound to it,
/// so writes through the view are what the runtime persists on close.
pub type SessionPayload = Arc<RwLock<Map<String, Value>>>;

pub trait SessionRuntime: Send {
    fn status(&self) -> SessionStatus;

    /// Route all persistence through `handler`.
    fn set_save_handler(&mut self, handler: Arc<dyn SaveHandler>);

    fn id_policy(&self) -> &IdPolicy;
    fn set_id_policy(&mut self, policy: IdPolicy);

    /// Start (or resume) the session for the current id, allocating one if
    /// none was set, and load its payload.
    fn start(&mut self) -> Result<()>;

    /// Start the session identified by `id`. The runtime's current id is
    /// only replaced if the start succeeds.
    fn start_with_id(&mut self, id: &str) -> Result<()>;

    fn id(&self) -> Option<String>;
    fn set_id(&mut self, id: &str) -> Result<()>;

    /// Switch the active session to a fresh id, keeping the payload. With
    /// `delete_old` the previous id's stored data is removed immediately.
    fn regenerate_id(&mut self, delete_old: bool) -> Result<()>;

    /// Remove the active session's stored data and end it.
    fn destroy(&mut self) -> Result<()>;

    /// Persist the payload and end the session.
    fn write_and_close(&mut self) -> Result<()>;

    fn payload(&self) -> SessionPayload;

    fn name(&self) -> &str;
    fn set_name(&mut self, name: &str);

    /// Seconds of inactivity after which stored data is garbage.
    fn gc_max_lifetime(&self) -> u64;
    fn set_gc_max_lifetime(&mut self, lifetime: u64);

    fn cache_limiter(&self) -> &str;
    fn set_cache_limiter(&mut self, limiter: &str);

    /// Minutes cached pages remain valid.
    fn cache_expire(&self) -> u32;
    fn set_cache_expire(&mut self, minutes: u32);

    fn cookie_params(&self) -> &CookieParams;
    fn set_cookie_params(&mut self, params: CookieParams);
}

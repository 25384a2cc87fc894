//! In-process session runtime backed by a save handler
//!
//! The payload is kept as a JSON object and serialized on close. Ids persist
//! across `write_and_close`/`start` cycles, so a closed session resumes with
//! its stored data the next time it is started.

use parking_lot::RwLock;
use rand::Rng;
use serde_json::Map;
use std::sync::Arc;

use sessio_handler::{MemoryHandler, SaveHandler};

use crate::cookie::CookieParams;
use crate::error::RuntimeError;
use crate::id::{generate_id, validate_id, IdPolicy, IdTransport};
use crate::status::SessionStatus;
use crate::{Result, SessionPayload, SessionRuntime};

pub const DEFAULT_NAME: &str = "SESSID";
pub const DEFAULT_GC_MAX_LIFETIME: u64 = 1440;
pub const DEFAULT_CACHE_LIMITER: &str = "nocache";
pub const DEFAULT_CACHE_EXPIRE: u32 = 180;

pub struct HandlerRuntime {
    enabled: bool,
    active: bool,
    handler: Arc<dyn SaveHandler>,
    id: Option<String>,
    payload: SessionPayload,
    name: String,
    save_path: String,
    gc_max_lifetime: u64,
    gc_probability: u32,
    gc_divisor: u32,
    cache_limiter: String,
    cache_expire: u32,
    cookie: CookieParams,
    id_policy: IdPolicy,
}

impl HandlerRuntime {
    /// Runtime persisting to a private [`MemoryHandler`] until another
    /// handler is registered.
    pub fn new() -> Self {
        Self {
            enabled: true,
            active: false,
            handler: Arc::new(MemoryHandler::new()),
            id: None,
            payload: Arc::new(RwLock::new(Map::new())),
            name: DEFAULT_NAME.to_string(),
            save_path: String::new(),
            gc_max_lifetime: DEFAULT_GC_MAX_LIFETIME,
            gc_probability: 1,
            gc_divisor: 100,
            cache_limiter: DEFAULT_CACHE_LIMITER.to_string(),
            cache_expire: DEFAULT_CACHE_EXPIRE,
            cookie: CookieParams::default(),
            id_policy: IdPolicy::default(),
        }
    }

    /// A runtime that reports sessions as unavailable.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn SaveHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_save_path(mut self, save_path: impl Into<String>) -> Self {
        self.save_path = save_path.into();
        self
    }

    /// Run garbage collection on `probability / divisor` of starts.
    /// A probability of 0 leaves collection to [`Self::collect_garbage`].
    pub fn with_gc_probability(mut self, probability: u32, divisor: u32) -> Self {
        self.gc_probability = probability;
        self.gc_divisor = divisor;
        self
    }

    pub fn handler(&self) -> &Arc<dyn SaveHandler> {
        &self.handler
    }

    /// Adopt an id presented by a client before the session starts.
    pub fn accept_request_id(&mut self, id: &str, transport: IdTransport) -> Result<()> {
        if self.active {
            return Err(RuntimeError::AlreadyActive);
        }

        if transport == IdTransport::Url && self.id_policy.use_only_cookies {
            tracing::warn!("Rejected session id supplied in URL");
            return Err(RuntimeError::UrlTransportRejected);
        }

        validate_id(id, &self.id_policy)?;
        self.id = Some(id.to_string());
        Ok(())
    }

    /// Out-of-band expiry pass over the handler's storage.
    pub fn collect_garbage(&self) -> Result<usize> {
        Ok(self.handler.gc(self.gc_max_lifetime)?)
    }

    /// Start under `id`. The id is only committed once its payload loaded.
    fn begin(&mut self, id: String) -> Result<()> {
        if !self.enabled {
            return Err(RuntimeError::Disabled);
        }
        if self.active {
            return Err(RuntimeError::AlreadyActive);
        }

        self.handler.open(&self.save_path, &self.name)?;
        self.load(&id)?;

        self.id = Some(id);
        self.active = true;
        self.maybe_collect_garbage();

        tracing::debug!(session_id = ?self.id, "Runtime session started");
        Ok(())
    }

    fn ensure_active(&self) -> Result<&str> {
        match (&self.id, self.active) {
            (Some(id), true) => Ok(id),
            _ => Err(RuntimeError::NotActive),
        }
    }

    fn load(&self, id: &str) -> Result<()> {
        let data = self.handler.read(id)?;
        let map = if data.is_empty() {
            Map::new()
        } else {
            serde_json::from_slice(&data)?
        };

        *self.payload.write() = map;
        Ok(())
    }

    fn maybe_collect_garbage(&self) {
        if self.gc_probability == 0 || self.gc_divisor == 0 {
            return;
        }

        if rand::thread_rng().gen_range(0..self.gc_divisor) < self.gc_probability {
            // Expiry is best-effort; a failed pass must not fail the start.
            if let Err(e) = self.handler.gc(self.gc_max_lifetime) {
                tracing::warn!("Session garbage collection failed: {}", e);
            }
        }
    }
}

impl Default for HandlerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRuntime for HandlerRuntime {
    fn status(&self) -> SessionStatus {
        if !self.enabled {
            SessionStatus::Disabled
        } else if self.active {
            SessionStatus::Active
        } else {
            SessionStatus::None
        }
    }

    fn set_save_handler(&mut self, handler: Arc<dyn SaveHandler>) {
        self.handler = handler;
    }

    fn id_policy(&self) -> &IdPolicy {
        &self.id_policy
    }

    fn set_id_policy(&mut self, policy: IdPolicy) {
        self.id_policy = policy;
    }

    fn start(&mut self) -> Result<()> {
        let id = match &self.id {
            Some(id) => id.clone(),
            None => generate_id(&self.id_policy),
        };
        self.begin(id)
    }

    fn start_with_id(&mut self, id: &str) -> Result<()> {
        validate_id(id, &self.id_policy)?;
        self.begin(id.to_string())
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn set_id(&mut self, id: &str) -> Result<()> {
        validate_id(id, &self.id_policy)?;
        self.id = Some(id.to_string());
        Ok(())
    }

    fn regenerate_id(&mut self, delete_old: bool) -> Result<()> {
        let old = self.ensure_active()?.to_string();
        let new = generate_id(&self.id_policy);

        if delete_old {
            self.handler.destroy(&old)?;
        }

        self.id = Some(new);
        tracing::debug!(old_id = %old, new_id = ?self.id, "Regenerated session id");
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        let id = self.ensure_active()?.to_string();

        self.handler.destroy(&id)?;
        self.handler.close()?;
        self.payload.write().clear();
        self.active = false;
        // A destroyed id is never handed out again
        self.id = None;

        Ok(())
    }

    fn write_and_close(&mut self) -> Result<()> {
        let id = self.ensure_active()?.to_string();
        let data = serde_json::to_vec(&*self.payload.read())?;

        self.handler.write(&id, &data)?;
        self.handler.close()?;
        self.active = false;

        Ok(())
    }

    fn payload(&self) -> SessionPayload {
        Arc::clone(&self.payload)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn gc_max_lifetime(&self) -> u64 {
        self.gc_max_lifetime
    }

    fn set_gc_max_lifetime(&mut self, lifetime: u64) {
        self.gc_max_lifetime = lifetime;
    }

    fn cache_limiter(&self) -> &str {
        &self.cache_limiter
    }

    fn set_cache_limiter(&mut self, limiter: &str) {
        self.cache_limiter = limiter.to_string();
    }

    fn cache_expire(&self) -> u32 {
        self.cache_expire
    }

    fn set_cache_expire(&mut self, minutes: u32) {
        self.cache_expire = minutes;
    }

    fn cookie_params(&self) -> &CookieParams {
        &self.cookie
    }

    fn set_cookie_params(&mut self, params: CookieParams) {
        self.cookie = params;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sessio_handler::SqlHandler;
    use sessio_storage::Database;

    fn sql_runtime() -> (HandlerRuntime, Arc<SqlHandler>) {
        let handler = Arc::new(SqlHandler::new(Database::open_in_memory().unwrap()));
        let runtime = HandlerRuntime::new()
            .with_handler(handler.clone())
            .with_gc_probability(0, 100);
        (runtime, handler)
    }

    #[test]
    fn test_payload_persists_across_starts() {
        let (mut runtime, handler) = sql_runtime();
        assert_eq!(runtime.status(), SessionStatus::None);

        runtime.start().unwrap();
        assert_eq!(runtime.status(), SessionStatus::Active);
        runtime
            .payload()
            .write()
            .insert("user".to_string(), json!({"id": 7}));
        let id = runtime.id().unwrap();
        runtime.write_and_close().unwrap();

        assert_eq!(handler.count().unwrap(), 1);

        runtime.payload().write().clear();
        runtime.start().unwrap();
        assert_eq!(runtime.id().unwrap(), id);
        assert_eq!(runtime.payload().read().get("user"), Some(&json!({"id": 7})));
    }

    #[test]
    fn test_regenerate_deletes_old_row() {
        let (mut runtime, handler) = sql_runtime();
        runtime.start().unwrap();
        runtime.payload().write().insert("k".to_string(), json!(1));
        runtime.write_and_close().unwrap();
        let old = runtime.id().unwrap();

        runtime.start().unwrap();
        runtime.regenerate_id(true).unwrap();
        let new = runtime.id().unwrap();
        assert_ne!(old, new);
        assert!(handler.read(&old).unwrap().is_empty());

        runtime.write_and_close().unwrap();
        assert!(handler.record(&old).unwrap().is_none());
        let stored: serde_json::Value =
            serde_json::from_slice(&handler.read(&new).unwrap()).unwrap();
        assert_eq!(stored, json!({"k": 1}));
    }

    #[test]
    fn test_destroy_clears_row_and_payload() {
        let (mut runtime, handler) = sql_runtime();
        runtime.start().unwrap();
        runtime.payload().write().insert("k".to_string(), json!(true));
        runtime.write_and_close().unwrap();

        runtime.start().unwrap();
        let destroyed = runtime.id().unwrap();
        runtime.destroy().unwrap();

        assert_eq!(runtime.status(), SessionStatus::None);
        assert_eq!(runtime.id(), None);
        assert!(runtime.payload().read().is_empty());
        assert_eq!(handler.count().unwrap(), 0);

        runtime.start().unwrap();
        assert_ne!(runtime.id().unwrap(), destroyed);
    }

    #[test]
    fn test_start_with_id_commits_only_on_success() {
        let handler = Arc::new(MemoryHandler::new());
        handler.write("broken", b"not json").unwrap();
        handler.write("good", b"{\"k\":1}").unwrap();

        let mut runtime = HandlerRuntime::new()
            .with_handler(handler)
            .with_gc_probability(0, 100);
        runtime.set_id("good").unwrap();

        assert!(matches!(
            runtime.start_with_id("broken"),
            Err(RuntimeError::Serialization(_))
        ));
        assert!(matches!(
            runtime.start_with_id("bad/id"),
            Err(RuntimeError::InvalidId(_))
        ));
        assert_eq!(runtime.id().as_deref(), Some("good"));

        runtime.start().unwrap();
        assert_eq!(runtime.payload().read().get("k"), Some(&json!(1)));
    }

    #[test]
    fn test_inactive_operations_fail() {
        let mut runtime = HandlerRuntime::new();
        assert!(matches!(runtime.write_and_close(), Err(RuntimeError::NotActive)));
        assert!(matches!(runtime.destroy(), Err(RuntimeError::NotActive)));
        assert!(matches!(runtime.regenerate_id(true), Err(RuntimeError::NotActive)));

        runtime.start().unwrap();
        assert!(matches!(runtime.start(), Err(RuntimeError::AlreadyActive)));
    }

    #[test]
    fn test_disabled_runtime() {
        let mut runtime = HandlerRuntime::disabled();
        assert_eq!(runtime.status(), SessionStatus::Disabled);
        assert!(matches!(runtime.start(), Err(RuntimeError::Disabled)));
    }

    #[test]
    fn test_request_id_transport() {
        let mut runtime = HandlerRuntime::new();
        let id = generate_id(runtime.id_policy());

        assert!(matches!(
            runtime.accept_request_id(&id, IdTransport::Url),
            Err(RuntimeError::UrlTransportRejected)
        ));
        assert!(matches!(
            runtime.accept_request_id("../etc/passwd", IdTransport::Cookie),
            Err(RuntimeError::InvalidId(_))
        ));

        runtime.accept_request_id(&id, IdTransport::Cookie).unwrap();
        runtime.start().unwrap();
        assert_eq!(runtime.id(), Some(id));
    }

    #[test]
    fn test_url_ids_allowed_when_policy_permits() {
        let mut runtime = HandlerRuntime::new();
        runtime.set_id_policy(IdPolicy {
            use_only_cookies: false,
            ..IdPolicy::hardened()
        });
        runtime.accept_request_id("abc123", IdTransport::Url).unwrap();
        assert_eq!(runtime.id().as_deref(), Some("abc123"));
    }

    #[test]
    fn test_start_always_collects_at_full_probability() {
        let handler = Arc::new(MemoryHandler::new());
        handler.write("stale", b"{}").unwrap();

        let mut runtime = HandlerRuntime::new()
            .with_handler(handler.clone())
            .with_gc_probability(1, 1);
        runtime.set_gc_max_lifetime(0);
        runtime.start().unwrap();

        assert!(handler.record("stale").is_none());
    }

    #[test]
    fn test_corrupt_payload_fails_start() {
        let handler = Arc::new(MemoryHandler::new());
        handler.write("abc", b"not json").unwrap();

        let mut runtime = HandlerRuntime::new().with_handler(handler);
        runtime.set_id("abc").unwrap();

        assert!(matches!(runtime.start(), Err(RuntimeError::Serialization(_))));
        assert_eq!(runtime.status(), SessionStatus::None);
    }
}

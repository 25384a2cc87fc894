//! Session lifecycle controller
//!
//! ```text
//! Closed --open--> Open --close--> Closed
//!                   |
//!                   +--destroy--> Closed (stored data removed)
//! ```
//!
//! Open, close and destroy are published as events of the same name so
//! subscribers can run around them; the controller's own step is always the
//! action of the publication.

use std::sync::Arc;

use sessio_events::{Event, Publisher};
use sessio_handler::SaveHandler;
use sessio_runtime::{CookieParams, IdPolicy, SessionRuntime, SessionStatus};

use crate::error::SessionError;
use crate::flash::{take_flash, Flash};
use crate::params::SessionParams;
use crate::Result;

/// Payload key under which all controller state lives.
pub const KEY_NAMESPACE: &str = "_sessio";
/// Params key holding the flash for the next open.
pub const KEY_FLASH: &str = "_flash";

pub const EVENT_OPEN: &str = "open";
pub const EVENT_CLOSE: &str = "close";
pub const EVENT_DESTROY: &str = "destroy";

pub struct Session<R: SessionRuntime> {
    runtime: R,
    handler: Arc<dyn SaveHandler>,
    params: SessionParams,
    flash: Option<Flash>,
    publisher: Publisher,
}

impl<R: SessionRuntime> Session<R> {
    pub fn new(runtime: R, handler: Arc<dyn SaveHandler>) -> Result<Self> {
        Self::with_params(runtime, handler, SessionParams::new())
    }

    /// Take control of `runtime`, routing its persistence through `handler`.
    ///
    /// Fails if the runtime cannot provide sessions or already has one
    /// started, since a session started elsewhere would bypass this controller.
    pub fn with_params(
        mut runtime: R,
        handler: Arc<dyn SaveHandler>,
        params: SessionParams,
    ) -> Result<Self> {
        match runtime.status() {
            SessionStatus::Disabled => {
                return Err(SessionError::Configuration(
                    "Sessions are not enabled in this runtime".to_string(),
                ))
            }
            SessionStatus::Active => {
                return Err(SessionError::Configuration(
                    "Session is already open; automatic session start must be disabled"
                        .to_string(),
                ))
            }
            SessionStatus::None => {}
        }

        // Session fixation: cookie-only ids with a strong generator
        runtime.set_id_policy(IdPolicy::hardened());
        runtime.set_save_handler(Arc::clone(&handler));

        Ok(Self {
            runtime,
            handler,
            params,
            flash: None,
            publisher: Publisher::new(),
        })
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn handler(&self) -> &Arc<dyn SaveHandler> {
        &self.handler
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SessionParams {
        &mut self.params
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut Publisher {
        &mut self.publisher
    }

    pub fn status(&self) -> SessionStatus {
        self.runtime.status()
    }

    pub fn is_disabled(&self) -> bool {
        self.status() == SessionStatus::Disabled
    }

    pub fn is_open(&self) -> bool {
        self.status().is_active()
    }

    // Lifecycle

    pub fn open(&mut self) -> Result<&mut Self> {
        self.open_event(Event::new(EVENT_OPEN))
    }

    /// Open the session identified by `id` instead of the runtime's current one.
    pub fn open_with_id(&mut self, id: &str) -> Result<&mut Self> {
        self.open_event(Event::new(EVENT_OPEN).with_param("id", id))
    }

    fn open_event(&mut self, event: Event) -> Result<&mut Self> {
        if self.is_open() {
            return Err(SessionError::Lifecycle("Session is already open".to_string()));
        }

        let publisher = self.publisher.clone();
        publisher
            .publish(event, |event| self.run_open(event))
            .map_err(|e| SessionError::Open(Box::new(e)))?;

        Ok(self)
    }

    // The runtime commits an explicit id only on a successful start, and every
    // step after it is infallible, so a failed open leaves the runtime as it was.
    fn run_open(&mut self, event: &mut Event) -> Result<()> {
        match event.param("id") {
            Some(id) => {
                let id = id.as_str().ok_or_else(|| {
                    SessionError::Configuration("Session id must be a string".to_string())
                })?;
                self.runtime.start_with_id(id)?;
            }
            None => self.runtime.start()?,
        }

        self.params.bind(self.runtime.payload(), KEY_NAMESPACE);
        self.update_flash();

        tracing::info!(
            session_id = ?self.runtime.id(),
            has_flash = self.flash.is_some(),
            "Opened session"
        );

        Ok(())
    }

    pub fn close(&mut self) -> Result<&mut Self> {
        self.ensure_open()?;

        let publisher = self.publisher.clone();
        publisher.publish(Event::new(EVENT_CLOSE), |_| self.run_close())?;

        Ok(self)
    }

    fn run_close(&mut self) -> Result<()> {
        self.runtime.write_and_close()?;
        self.params.detach();

        tracing::info!(session_id = ?self.runtime.id(), "Closed session");
        Ok(())
    }

    /// Remove the session's stored data and empty the params. The session is
    /// no longer open afterwards; opening again starts from empty data.
    pub fn destroy(&mut self) -> Result<&mut Self> {
        self.ensure_open()?;

        let publisher = self.publisher.clone();
        publisher.publish(Event::new(EVENT_DESTROY), |_| self.run_destroy())?;

        Ok(self)
    }

    fn run_destroy(&mut self) -> Result<()> {
        let id = self.runtime.id();
        self.runtime.destroy()?;
        self.params.clear();
        self.flash = None;

        tracing::info!(session_id = ?id, "Destroyed session");
        Ok(())
    }

    /// Destroy, open and regenerate the id, in that order.
    pub fn restart(&mut self) -> Result<&mut Self> {
        self.destroy()?.open()?.regenerate_id()?;
        Ok(self)
    }

    /// Move the open session to a fresh id. Data stored under the old id is
    /// deleted immediately.
    pub fn regenerate_id(&mut self) -> Result<&mut Self> {
        self.ensure_open()?;

        let old = self.runtime.id();
        self.runtime.regenerate_id(true)?;

        tracing::info!(old_id = ?old, new_id = ?self.runtime.id(), "Regenerated session id");
        Ok(self)
    }

    // Identity

    pub fn id(&self) -> Result<String> {
        self.ensure_open()?;
        self.runtime
            .id()
            .ok_or_else(|| SessionError::Lifecycle("Session has no id".to_string()))
    }

    pub fn set_id(&mut self, id: &str) -> Result<&mut Self> {
        self.ensure_open()?;
        self.runtime.set_id(id)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        self.runtime.name()
    }

    pub fn set_name(&mut self, name: &str) -> Result<&mut Self> {
        self.ensure_not_open("name")?;
        self.runtime.set_name(name);
        Ok(self)
    }

    pub fn id_policy(&self) -> &IdPolicy {
        self.runtime.id_policy()
    }

    /// Replace the id policy. URL-transported ids stay forbidden.
    pub fn set_id_policy(&mut self, policy: IdPolicy) -> Result<&mut Self> {
        self.ensure_not_open("id policy")?;
        if !policy.use_only_cookies {
            return Err(SessionError::Configuration(
                "Session ids must be transported by cookie only".to_string(),
            ));
        }
        self.runtime.set_id_policy(policy);
        Ok(self)
    }

    // Expiry and caching

    /// Seconds of inactivity before stored data may be collected.
    pub fn lifetime(&self) -> u64 {
        self.runtime.gc_max_lifetime()
    }

    pub fn set_lifetime(&mut self, lifetime: u64) -> Result<&mut Self> {
        self.ensure_not_open("lifetime")?;
        self.runtime.set_gc_max_lifetime(lifetime);
        Ok(self)
    }

    pub fn cache_limiter(&self) -> &str {
        self.runtime.cache_limiter()
    }

    pub fn set_cache_limiter(&mut self, limiter: &str) -> Result<&mut Self> {
        self.ensure_not_open("cache limiter")?;
        self.runtime.set_cache_limiter(limiter);
        Ok(self)
    }

    pub fn cache_expire(&self) -> u32 {
        self.runtime.cache_expire()
    }

    pub fn set_cache_expire(&mut self, minutes: u32) -> Result<&mut Self> {
        self.ensure_not_open("cache expire")?;
        self.runtime.set_cache_expire(minutes);
        Ok(self)
    }

    // Cookie attributes

    pub fn cookie_params(&self) -> &CookieParams {
        self.runtime.cookie_params()
    }

    pub fn set_cookie_params(&mut self, params: CookieParams) -> &mut Self {
        self.runtime.set_cookie_params(params);
        self
    }

    fn update_cookie(&mut self, f: impl FnOnce(&mut CookieParams)) -> &mut Self {
        let mut params = self.cookie_params().clone();
        f(&mut params);
        self.set_cookie_params(params)
    }

    pub fn cookie_lifetime(&self) -> u64 {
        self.cookie_params().lifetime
    }

    pub fn set_cookie_lifetime(&mut self, lifetime: u64) -> &mut Self {
        self.update_cookie(|c| c.lifetime = lifetime)
    }

    pub fn cookie_path(&self) -> Option<&str> {
        self.cookie_params().path.as_deref()
    }

    pub fn has_cookie_path(&self) -> bool {
        self.cookie_path().is_some()
    }

    pub fn set_cookie_path(&mut self, path: &str) -> &mut Self {
        let path = path.to_string();
        self.update_cookie(|c| c.path = Some(path))
    }

    pub fn remove_cookie_path(&mut self) -> &mut Self {
        self.update_cookie(|c| c.path = None)
    }

    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_params().domain.as_deref()
    }

    pub fn has_cookie_domain(&self) -> bool {
        self.cookie_domain().is_some()
    }

    pub fn set_cookie_domain(&mut self, domain: &str) -> &mut Self {
        let domain = domain.to_string();
        self.update_cookie(|c| c.domain = Some(domain))
    }

    pub fn remove_cookie_domain(&mut self) -> &mut Self {
        self.update_cookie(|c| c.domain = None)
    }

    pub fn is_cookie_secure(&self) -> bool {
        self.cookie_params().secure
    }

    pub fn set_cookie_secure(&mut self, secure: bool) -> &mut Self {
        self.update_cookie(|c| c.secure = secure)
    }

    pub fn is_cookie_http_only(&self) -> bool {
        self.cookie_params().http_only
    }

    pub fn set_cookie_http_only(&mut self, http_only: bool) -> &mut Self {
        self.update_cookie(|c| c.http_only = http_only)
    }

    // Flash

    /// The flash delivered by the most recent open, if any.
    pub fn flash(&self) -> Option<&Flash> {
        self.flash.as_ref()
    }

    pub fn has_flash(&self) -> bool {
        self.flash.is_some()
    }

    pub fn flash_message(&self) -> Option<&str> {
        self.flash.as_ref().map(|f| f.message.as_str())
    }

    pub fn flash_type(&self) -> Option<&str> {
        self.flash.as_ref().and_then(|f| f.kind.as_deref())
    }

    /// Queue a flash for delivery on the next open. Replaces any queued flash.
    pub fn set_next_flash(&mut self, message: &str, kind: Option<&str>) -> Result<&mut Self> {
        let value = serde_json::to_value(Flash::new(message, kind))?;
        self.params.set_value(KEY_FLASH, value);
        Ok(self)
    }

    fn update_flash(&mut self) {
        self.flash = take_flash(&mut self.params, KEY_FLASH);
    }

    // Guards

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::Lifecycle("Session is not open".to_string()))
        }
    }

    fn ensure_not_open(&self, setting: &str) -> Result<()> {
        if self.is_open() {
            Err(SessionError::Configuration(format!(
                "Cannot change {} while the session is open",
                setting
            )))
        } else {
            Ok(())
        }
    }
}

impl<R: SessionRuntime> Drop for Session<R> {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                tracing::warn!("Failed to close session on drop: {}", e);
            }
        }
    }
}

impl<R: SessionRuntime> std::fmt::Debug for Session<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("id", &self.runtime.id())
            .field("params", &self.params.to_map())
            .field("flash", &self.flash)
            .finish()
    }
}

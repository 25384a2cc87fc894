//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use sessio_handler::SqlHandler;
use sessio_runtime::{
    CookieParams, HandlerRuntime, IdPolicy, SessionRuntime, DEFAULT_CACHE_EXPIRE,
    DEFAULT_CACHE_LIMITER, DEFAULT_GC_MAX_LIFETIME, DEFAULT_NAME,
};
use sessio_storage::{Database, DEFAULT_TABLE_NAME};

use crate::session::Session;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Table holding session records
    pub table_name: String,
    /// Session (cookie) name
    pub name: String,
    /// Seconds of inactivity before a session may be collected
    pub lifetime: u64,
    pub cache_limiter: String,
    /// Minutes
    pub cache_expire: u32,
    pub cookie: CookieParams,
    pub id_policy: IdPolicy,
    /// Garbage collection runs on `gc_probability / gc_divisor` of opens
    pub gc_probability: u32,
    pub gc_divisor: u32,
}

impl SessionConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("sessions.db"),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            name: DEFAULT_NAME.to_string(),
            lifetime: DEFAULT_GC_MAX_LIFETIME,
            cache_limiter: DEFAULT_CACHE_LIMITER.to_string(),
            cache_expire: DEFAULT_CACHE_EXPIRE,
            cookie: CookieParams::default(),
            id_policy: IdPolicy::hardened(),
            gc_probability: 1,
            gc_divisor: 100,
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("sessio"))
            .unwrap_or_else(|| PathBuf::from(".sessio"))
    }

    /// Open the configured database and table.
    pub fn open_handler(&self) -> Result<SqlHandler> {
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&self.database_path)?;
        Ok(SqlHandler::with_table_name(db, &self.table_name)?)
    }

    /// Build a configured, not yet opened session over the configured table.
    pub fn build_session(&self) -> Result<Session<HandlerRuntime>> {
        let handler = Arc::new(self.open_handler()?);
        let runtime =
            HandlerRuntime::new().with_gc_probability(self.gc_probability, self.gc_divisor);

        let mut session = Session::new(runtime, handler)?;
        session.apply_config(self)?;

        tracing::info!(
            database = %self.database_path.display(),
            table = %self.table_name,
            "Session store ready"
        );

        Ok(session)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

impl<R: SessionRuntime> Session<R> {
    /// Apply every runtime setting in `config`. Fails while the session is open.
    pub fn apply_config(&mut self, config: &SessionConfig) -> Result<&mut Self> {
        self.set_name(&config.name)?
            .set_lifetime(config.lifetime)?
            .set_cache_limiter(&config.cache_limiter)?
            .set_cache_expire(config.cache_expire)?
            .set_id_policy(config.id_policy.clone())?
            .set_cookie_params(config.cookie.clone());

        Ok(self)
    }
}

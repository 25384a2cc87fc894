//! Session cookie attributes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieParams {
    /// Cookie lifetime in seconds; 0 lasts until the browser closes
    pub lifetime: u64,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieParams {
    fn default() -> Self {
        Self {
            lifetime: 0,
            path: Some("/".to_string()),
            domain: None,
            secure: false,
            http_only: false,
        }
    }
}

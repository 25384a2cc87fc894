//! One-shot flash messages

use serde::{Deserialize, Serialize};

use crate::params::SessionParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Flash {
    pub fn new(message: impl Into<String>, kind: Option<&str>) -> Self {
        Self {
            message: message.into(),
            kind: kind.map(str::to_string),
        }
    }
}

/// Remove the pending flash under `key` from `params` and return it.
/// A malformed entry is dropped so it can never be delivered.
pub(crate) fn take_flash(params: &mut SessionParams, key: &str) -> Option<Flash> {
    let value = params.remove(key)?;

    match serde_json::from_value(value) {
        Ok(flash) => Some(flash),
        Err(e) => {
            tracing::warn!("Discarding malformed flash message: {}", e);
            None
        }
    }
}

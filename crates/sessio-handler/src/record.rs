//! Persisted session record

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::{Result, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Session identifier (primary key)
    pub id: String,
    /// Raw session payload
    pub data: Vec<u8>,
    /// When the record was first written
    pub created: DateTime<Utc>,
    /// When the record was last written
    pub modified: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(id: String, data: Vec<u8>, now: DateTime<Utc>) -> Self {
        let now = truncate_to_seconds(now);

        Self {
            id,
            data,
            created: now,
            modified: now,
        }
    }

    /// Replace the payload, keeping `created`.
    pub fn touch(&mut self, data: Vec<u8>, now: DateTime<Utc>) {
        self.data = data;
        self.modified = truncate_to_seconds(now);
    }

    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.modified <= truncate_to_seconds(cutoff)
    }
}

/// RFC 3339 at second precision in UTC. Values of this form sort chronologically.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

pub(crate) fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

/// `now - lifetime`, or `None` when the lifetime reaches past the representable range.
pub(crate) fn expiry_cutoff(now: DateTime<Utc>, lifetime: u64) -> Option<DateTime<Utc>> {
    i64::try_from(lifetime)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_sub_signed(lifetime))
}

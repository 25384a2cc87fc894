//! Relational save handler
//!
//! Payloads are stored base64-encoded in a TEXT column so arbitrary bytes
//! survive any text-only transport or tooling around the table.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rusqlite::OptionalExtension;
use std::sync::Arc;

use sessio_storage::{ensure_session_table, Database, DEFAULT_TABLE_NAME};

use crate::clock::{Clock, SystemClock};
use crate::record::{expiry_cutoff, format_timestamp, parse_timestamp, SessionRecord};
use crate::{Result, SaveHandler};

pub struct SqlHandler {
    db: Database,
    table_name: String,
    clock: Arc<dyn Clock>,
}

impl SqlHandler {
    /// Handler over the default `session` table, created by the migrations.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Handler over a custom table, created if it does not exist yet.
    pub fn with_table_name(db: Database, table_name: &str) -> Result<Self> {
        db.with_connection(|conn| ensure_session_table(conn, table_name))?;

        Ok(Self {
            db,
            table_name: table_name.to_string(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch the full stored row, timestamps included.
    pub fn record(&self, id: &str) -> Result<Option<SessionRecord>> {
        let row: Option<(String, String, String)> = self.db.with_connection(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        r#"SELECT data, created, modified FROM "{}" WHERE id = ?1"#,
                        self.table_name
                    ),
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?)
        })?;

        match row {
            Some((data, created, modified)) => Ok(Some(SessionRecord {
                id: id.to_string(),
                data: BASE64_STANDARD.decode(data)?,
                created: parse_timestamp(&created)?,
                modified: parse_timestamp(&modified)?,
            })),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        self.db.with_connection(|conn| {
            let count: i64 = conn.query_row(
                &format!(r#"SELECT COUNT(*) FROM "{}""#, self.table_name),
                [],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

impl SaveHandler for SqlHandler {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let encoded: Option<String> = self.db.with_connection(|conn| {
            Ok(conn
                .query_row(
                    &format!(r#"SELECT data FROM "{}" WHERE id = ?1"#, self.table_name),
                    [id],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        match encoded {
            Some(encoded) => {
                let data = BASE64_STANDARD.decode(encoded)?;
                tracing::debug!(session_id = %id, bytes = data.len(), "Read session");
                Ok(data)
            }
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        let now = format_timestamp(self.clock.now());
        let encoded = BASE64_STANDARD.encode(data);

        self.db.with_connection(|conn| {
            conn.execute(
                &format!(
                    r#"INSERT INTO "{}" (id, data, created, modified)
                       VALUES (?1, ?2, ?3, ?3)
                       ON CONFLICT(id) DO UPDATE SET
                           data = excluded.data,
                           modified = excluded.modified"#,
                    self.table_name
                ),
                rusqlite::params![id, encoded, now],
            )?;
            Ok(())
        })?;

        tracing::debug!(session_id = %id, bytes = data.len(), "Wrote session");
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                &format!(r#"DELETE FROM "{}" WHERE id = ?1"#, self.table_name),
                [id],
            )?;
            Ok(())
        })
    }

    fn gc(&self, lifetime: u64) -> Result<usize> {
        let Some(cutoff) = expiry_cutoff(self.clock.now(), lifetime) else {
            return Ok(0);
        };
        let cutoff = format_timestamp(cutoff);

        let removed = self.db.with_connection(|conn| {
            Ok(conn.execute(
                &format!(r#"DELETE FROM "{}" WHERE modified <= ?1"#, self.table_name),
                [&cutoff],
            )?)
        })?;

        tracing::info!(table = %self.table_name, removed, "Collected expired sessions");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    fn handler() -> (SqlHandler, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let db = Database::open_in_memory().unwrap();
        (SqlHandler::new(db).with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_read_absent_is_empty() {
        let (handler, _) = handler();
        assert!(handler.read("missing").unwrap().is_empty());
    }

    #[test]
    fn test_binary_payload_survives() {
        let (handler, _) = handler();
        let payloads: [&[u8]; 3] = [b"", b"plain text", &[0x00, 0xff, 0xfe, 0x80, 0x0a]];

        for (i, payload) in payloads.iter().enumerate() {
            let id = format!("sess-{i}");
            handler.write(&id, payload).unwrap();
            assert_eq!(handler.read(&id).unwrap(), *payload);
        }
    }

    #[test]
    fn test_every_byte_and_large_payload_survive() {
        let (handler, _) = handler();
        let every_byte: Vec<u8> = (0..=255u8).collect();
        let large: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();

        handler.write("bytes", &every_byte).unwrap();
        handler.write("large", &large).unwrap();

        assert_eq!(handler.read("bytes").unwrap(), every_byte);
        assert_eq!(handler.read("large").unwrap(), large);
    }

    #[test]
    fn test_write_updates_keep_created() {
        let (handler, clock) = handler();
        let first_write = clock.now();

        handler.write("abc", b"first").unwrap();
        clock.advance(45);
        handler.write("abc", b"second").unwrap();

        let record = handler.record("abc").unwrap().unwrap();
        assert_eq!(record.created, first_write);
        assert_eq!(record.modified, first_write + Duration::seconds(45));
        assert!(record.modified >= record.created);
        assert_eq!(record.data, b"second");
        assert_eq!(handler.count().unwrap(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (handler, _) = handler();
        handler.write("abc", b"data").unwrap();

        handler.destroy("abc").unwrap();
        handler.destroy("abc").unwrap();
        handler.destroy("never-written").unwrap();

        assert!(handler.read("abc").unwrap().is_empty());
    }

    #[test]
    fn test_gc_boundary_is_inclusive() {
        let (handler, clock) = handler();
        let lifetime = 600;

        handler.write("expired", b"x").unwrap();
        clock.advance(1);
        handler.write("fresh", b"y").unwrap();

        // "expired" now sits exactly at now - lifetime, "fresh" one second after it
        clock.advance(lifetime as i64 - 1);
        let removed = handler.gc(lifetime).unwrap();

        assert_eq!(removed, 1);
        assert!(handler.record("expired").unwrap().is_none());
        assert!(handler.record("fresh").unwrap().is_some());
    }

    #[test]
    fn test_gc_with_nothing_expired() {
        let (handler, _) = handler();
        handler.write("abc", b"data").unwrap();
        assert_eq!(handler.gc(1440).unwrap(), 0);
        assert_eq!(handler.gc(u64::MAX).unwrap(), 0);
    }

    #[test]
    fn test_custom_table_name() {
        let db = Database::open_in_memory().unwrap();
        let handler = SqlHandler::with_table_name(db.clone(), "web_sessions").unwrap();
        handler.write("abc", b"data").unwrap();

        assert_eq!(handler.table_name(), "web_sessions");
        assert_eq!(handler.read("abc").unwrap(), b"data");
        // Default table untouched
        assert!(SqlHandler::new(db).read("abc").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_table_name() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            SqlHandler::with_table_name(db, "session; --"),
            Err(sessio_storage::StorageError::InvalidTableName(_))
        ));
    }

    #[test]
    fn test_corrupt_payload_is_storage_error() {
        let (handler, _) = handler();
        handler
            .database()
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO session (id, data, created, modified) VALUES ('bad', '!!!', 'x', 'x')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            handler.read("bad"),
            Err(sessio_storage::StorageError::Decode(_))
        ));
    }

    fn file_handlers(dir: &std::path::Path) -> (SqlHandler, SqlHandler, Arc<FixedClock>) {
        let path = dir.join("sessions.db");
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let first = SqlHandler::new(Database::open(&path).unwrap()).with_clock(clock.clone());
        let second = SqlHandler::new(Database::open(&path).unwrap()).with_clock(clock.clone());
        (first, second, clock)
    }

    #[test]
    fn test_concurrent_writers_share_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second, clock) = file_handlers(dir.path());
        let created = clock.now();

        first.write("shared", b"initial").unwrap();
        clock.advance(30);

        const ROUNDS: usize = 50;
        std::thread::scope(|scope| {
            for (name, handler) in [("a", &first), ("b", &second)] {
                scope.spawn(move || {
                    for i in 0..ROUNDS {
                        handler
                            .write("shared", format!("{name}-{i}").as_bytes())
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(first.count().unwrap(), 1);
        let record = second.record("shared").unwrap().unwrap();
        assert_eq!(record.created, created);
        assert_eq!(record.modified, clock.now());

        // Whichever thread finished last wrote its final round
        let last_a = format!("a-{}", ROUNDS - 1).into_bytes();
        let last_b = format!("b-{}", ROUNDS - 1).into_bytes();
        assert!(record.data == last_a || record.data == last_b);
    }

    #[test]
    fn test_gc_alongside_writes_keeps_fresh_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (collector, writer, clock) = file_handlers(dir.path());

        collector.write("stale", b"old").unwrap();
        clock.advance(100);

        let removed = std::thread::scope(|scope| {
            let writes = scope.spawn(|| {
                for i in 0..20 {
                    writer.write(&format!("fresh-{i}"), b"new").unwrap();
                }
            });
            let removed = collector.gc(50).unwrap();
            writes.join().unwrap();
            removed
        });

        assert_eq!(removed, 1);
        assert!(collector.record("stale").unwrap().is_none());
        assert_eq!(writer.count().unwrap(), 20);
        for i in 0..20 {
            assert_eq!(collector.read(&format!("fresh-{i}")).unwrap(), b"new");
        }
    }

    #[test]
    fn test_unparseable_timestamp_is_storage_error() {
        let (handler, _) = handler();
        handler
            .database()
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO session (id, data, created, modified) VALUES ('odd', '', 'x', 'x')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            handler.record("odd"),
            Err(sessio_storage::StorageError::InvalidTimestamp(_))
        ));
    }
}

//! Database migrations
//!
//! Schema: `schema_version` plus the default session table. Handlers using a
//! custom table name create it on demand through [`ensure_session_table`].

use crate::error::StorageError;
use crate::Result;
use rusqlite::Connection;

const SCHEMA_VERSION: i32 = 1;

pub const DEFAULT_TABLE_NAME: &str = "session";

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<i32, _> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        });

    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(rusqlite::Error::SqliteFailure(_, _)) => {
            // Table doesn't exist yet
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
                [],
            )?;
            conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v1: session table");
    ensure_session_table(conn, DEFAULT_TABLE_NAME)
}

/// Create a session table named `table` unless it already exists.
///
/// Timestamps are stored as RFC 3339 text at second precision, which sorts
/// and compares chronologically.
pub fn ensure_session_table(conn: &Connection, table: &str) -> Result<()> {
    validate_table_name(table)?;

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS "idx_{table}_modified" ON "{table}"(modified);
    "#
    ))?;

    Ok(())
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_custom_table() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_session_table(&conn, "app_sessions").unwrap();

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM app_sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        let conn = Connection::open_in_memory().unwrap();

        for name in ["", "1session", "session; DROP TABLE x", "sess\"ion", "a-b"] {
            assert!(matches!(
                ensure_session_table(&conn, name),
                Err(StorageError::InvalidTableName(_))
            ));
        }
    }
}

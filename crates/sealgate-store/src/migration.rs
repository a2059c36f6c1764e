//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL string that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;

use sealgate_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent; safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: blobs and the epoch clock.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Envelope blobs, content addressed
        CREATE TABLE blobs (
            handle TEXT PRIMARY KEY,          -- hex Blake3 of bytes
            bytes BLOB NOT NULL,
            size INTEGER NOT NULL,
            stored_epoch INTEGER NOT NULL,
            end_epoch INTEGER NOT NULL,       -- first epoch the blob is unreadable
            deletable INTEGER NOT NULL,       -- 0 = pinned until end_epoch
            stored_at INTEGER NOT NULL        -- local wall clock (Unix ms)
        );

        -- Single-row epoch clock
        CREATE TABLE store_state (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            epoch INTEGER NOT NULL
        );
        INSERT INTO store_state (id, epoch) VALUES (0, 0);

        CREATE INDEX idx_blobs_end_epoch ON blobs(end_epoch);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"blobs".to_string()));
        assert!(tables.contains(&"store_state".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);

        let epoch: i64 = conn
            .query_row("SELECT epoch FROM store_state WHERE id = 0", [], |row| row.get(0))
            .unwrap();
        assert_eq!(epoch, 0);
    }
}

//! SQLite implementation of the BlobStore trait.
//!
//! The persistent backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use sealgate_core::{now_millis, BlobHandle};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{check_options, BlobInfo, BlobStore, WriteOptions};

/// SQLite-based blob store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBlobStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Backend(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("spawn_blocking failed: {}", e)))?
    }
}

fn current_epoch(conn: &Connection) -> Result<u64> {
    let epoch: i64 = conn.query_row("SELECT epoch FROM store_state WHERE id = 0", [], |row| {
        row.get(0)
    })?;
    u64::try_from(epoch).map_err(|_| StoreError::InvalidData(format!("negative epoch {}", epoch)))
}

fn row_to_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlobInfo> {
    Ok(BlobInfo {
        handle: BlobHandle::new(row.get::<_, String>("handle")?),
        size: row.get::<_, i64>("size")? as u64,
        stored_epoch: row.get::<_, i64>("stored_epoch")? as u64,
        end_epoch: row.get::<_, i64>("end_epoch")? as u64,
        deletable: row.get::<_, i64>("deletable")? != 0,
    })
}

fn live_info(conn: &Connection, handle: &str, epoch: u64) -> Result<Option<BlobInfo>> {
    conn.query_row(
        "SELECT handle, size, stored_epoch, end_epoch, deletable
         FROM blobs WHERE handle = ?1 AND end_epoch > ?2",
        params![handle, epoch as i64],
        row_to_info,
    )
    .optional()
    .map_err(StoreError::from)
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn write(&self, bytes: &[u8], options: WriteOptions) -> Result<BlobHandle> {
        check_options(&options)?;

        let handle = BlobHandle::for_content(bytes);
        let bytes = bytes.to_vec();
        let key = handle.as_str().to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let epoch = current_epoch(&tx)?;
            let end_epoch = epoch + options.epochs as u64;

            match live_info(&tx, &key, epoch)? {
                Some(existing) => {
                    tx.execute(
                        "UPDATE blobs SET end_epoch = ?2, deletable = ?3 WHERE handle = ?1",
                        params![
                            key,
                            existing.end_epoch.max(end_epoch) as i64,
                            (existing.deletable && options.deletable) as i64,
                        ],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT OR REPLACE INTO blobs (
                            handle, bytes, size, stored_epoch, end_epoch, deletable, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            key,
                            bytes,
                            bytes.len() as i64,
                            epoch as i64,
                            end_epoch as i64,
                            options.deletable as i64,
                            now_millis(),
                        ],
                    )?;
                }
            }

            tx.commit()?;
            debug!(handle = %key, size = bytes.len(), end_epoch, "stored blob");
            Ok(())
        })
        .await?;

        Ok(handle)
    }

    async fn read(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        let key = handle.as_str().to_string();

        self.blocking(move |conn| {
            let epoch = current_epoch(conn)?;
            conn.query_row(
                "SELECT bytes FROM blobs WHERE handle = ?1 AND end_epoch > ?2",
                params![key, epoch as i64],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound(key))
        })
        .await
    }

    async fn info(&self, handle: &BlobHandle) -> Result<Option<BlobInfo>> {
        let key = handle.as_str().to_string();

        self.blocking(move |conn| {
            let epoch = current_epoch(conn)?;
            live_info(conn, &key, epoch)
        })
        .await
    }

    async fn current_epoch(&self) -> Result<u64> {
        self.blocking(|conn| current_epoch(conn)).await
    }

    async fn advance_epoch(&self) -> Result<u64> {
        let epoch = self
            .blocking(|conn| {
                let tx = conn.transaction()?;
                tx.execute("UPDATE store_state SET epoch = epoch + 1 WHERE id = 0", [])?;
                let epoch = current_epoch(&tx)?;
                let purged = tx.execute(
                    "DELETE FROM blobs WHERE end_epoch <= ?1",
                    params![epoch as i64],
                )?;
                tx.commit()?;
                debug!(epoch, purged, "advanced storage epoch");
                Ok(epoch)
            })
            .await?;
        Ok(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let store = SqliteBlobStore::open_memory().unwrap();
        let handle = store.write(b"envelope", WriteOptions::default()).await.unwrap();

        assert_eq!(store.read(&handle).await.unwrap(), b"envelope");

        let info = store.info(&handle).await.unwrap().unwrap();
        assert_eq!(info.size, 8);
        assert_eq!(info.stored_epoch, 0);
        assert_eq!(info.end_epoch, 1);
        assert!(info.deletable);
    }

    #[tokio::test]
    async fn test_unknown_handle_not_found() {
        let store = SqliteBlobStore::open_memory().unwrap();
        let result = store.read(&BlobHandle::new("missing")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expiry_and_purge() {
        let store = SqliteBlobStore::open_memory().unwrap();
        let handle = store.write(b"data", WriteOptions::default()).await.unwrap();

        assert_eq!(store.advance_epoch().await.unwrap(), 1);
        assert!(matches!(store.read(&handle).await, Err(StoreError::NotFound(_))));
        assert!(store.info(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_deletable_write_pins_blob() {
        let store = SqliteBlobStore::open_memory().unwrap();
        let handle = store.write(b"data", WriteOptions::default()).await.unwrap();
        store
            .write(b"data", WriteOptions::default().deletable(false).epochs(4))
            .await
            .unwrap();

        let info = store.info(&handle).await.unwrap().unwrap();
        assert!(!info.deletable);
        assert_eq!(info.end_epoch, 4);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.db");

        let handle = {
            let store = SqliteBlobStore::open(&path).unwrap();
            let handle = store
                .write(b"persisted", WriteOptions::default().epochs(3))
                .await
                .unwrap();
            store.advance_epoch().await.unwrap();
            handle
        };

        let store = SqliteBlobStore::open(&path).unwrap();
        assert_eq!(store.current_epoch().await.unwrap(), 1);
        assert_eq!(store.read(&handle).await.unwrap(), b"persisted");
    }
}

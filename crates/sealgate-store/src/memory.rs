//! In-memory implementation of the BlobStore trait.
//!
//! Same semantics as SQLite, no persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use sealgate_core::BlobHandle;

use crate::error::{Result, StoreError};
use crate::traits::{check_options, BlobInfo, BlobStore, WriteOptions};

/// In-memory blob store.
///
/// All data is lost when the store is dropped.
pub struct MemoryBlobStore {
    inner: RwLock<MemoryBlobStoreInner>,
}

struct MemoryBlobStoreInner {
    epoch: u64,
    blobs: HashMap<BlobHandle, StoredBlob>,
}

struct StoredBlob {
    bytes: Vec<u8>,
    info: BlobInfo,
}

impl MemoryBlobStore {
    /// Create a new empty store at epoch 0.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryBlobStoreInner {
                epoch: 0,
                blobs: HashMap::new(),
            }),
        }
    }

    /// Number of live blobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.blobs.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, bytes: &[u8], options: WriteOptions) -> Result<BlobHandle> {
        check_options(&options)?;

        let handle = BlobHandle::for_content(bytes);
        let mut inner = self.inner.write().await;
        let epoch = inner.epoch;
        let end_epoch = epoch + options.epochs as u64;

        match inner.blobs.get_mut(&handle) {
            Some(existing) if existing.info.is_live_at(epoch) => {
                existing.info.end_epoch = existing.info.end_epoch.max(end_epoch);
                existing.info.deletable &= options.deletable;
            }
            _ => {
                inner.blobs.insert(
                    handle.clone(),
                    StoredBlob {
                        bytes: bytes.to_vec(),
                        info: BlobInfo {
                            handle: handle.clone(),
                            size: bytes.len() as u64,
                            stored_epoch: epoch,
                            end_epoch,
                            deletable: options.deletable,
                        },
                    },
                );
            }
        }

        debug!(%handle, size = bytes.len(), end_epoch, "stored blob");
        Ok(handle)
    }

    async fn read(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        let inner = self.inner.read().await;
        inner
            .blobs
            .get(handle)
            .filter(|b| b.info.is_live_at(inner.epoch))
            .map(|b| b.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    async fn info(&self, handle: &BlobHandle) -> Result<Option<BlobInfo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .blobs
            .get(handle)
            .filter(|b| b.info.is_live_at(inner.epoch))
            .map(|b| b.info.clone()))
    }

    async fn current_epoch(&self) -> Result<u64> {
        Ok(self.inner.read().await.epoch)
    }

    async fn advance_epoch(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        inner.epoch += 1;
        let epoch = inner.epoch;
        inner.blobs.retain(|_, b| b.info.is_live_at(epoch));
        debug!(epoch, remaining = inner.blobs.len(), "advanced storage epoch");
        Ok(epoch)
    }
}

//! BlobStore trait: the abstract interface for envelope persistence.
//!
//! The gateway never interprets what it stores here. Blobs are addressed by
//! content and retained for a number of storage epochs. The writer's
//! deletable flag is recorded with the blob.

use async_trait::async_trait;
use sealgate_core::BlobHandle;

use crate::error::Result;

/// Options attached to a blob write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Number of epochs the blob is retained for, counted from the current one.
    pub epochs: u32,
    /// Whether the blob may be deleted before its retention horizon.
    pub deletable: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            deletable: true,
        }
    }
}

impl WriteOptions {
    /// Retain for `epochs` epochs.
    pub fn epochs(mut self, epochs: u32) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set the deletable flag.
    pub fn deletable(mut self, deletable: bool) -> Self {
        self.deletable = deletable;
        self
    }
}

/// Metadata of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// The blob's handle.
    pub handle: BlobHandle,
    /// Size in bytes.
    pub size: u64,
    /// Epoch the blob was first stored in.
    pub stored_epoch: u64,
    /// First epoch in which the blob is no longer readable.
    pub end_epoch: u64,
    /// Whether the blob may be deleted early.
    pub deletable: bool,
}

impl BlobInfo {
    /// Whether the blob is readable in `epoch`.
    pub fn is_live_at(&self, epoch: u64) -> bool {
        epoch < self.end_epoch
    }
}

/// The BlobStore trait: async interface for envelope persistence.
///
/// # Design Notes
///
/// - **Content addressing**: handles are the hex Blake3 of the bytes, so
///   writing the same bytes twice returns the same handle. A repeated write
///   extends retention to the later horizon and a non-deletable write
///   clears the deletable flag.
/// - **Retention**: a blob written in epoch `e` with `epochs = n` is readable
///   until epoch `e + n`. Expired blobs read as `NotFound`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` and return their handle.
    async fn write(&self, bytes: &[u8], options: WriteOptions) -> Result<BlobHandle>;

    /// Read a blob. Unknown or expired handles are `NotFound`.
    async fn read(&self, handle: &BlobHandle) -> Result<Vec<u8>>;

    /// Metadata for a live blob.
    async fn info(&self, handle: &BlobHandle) -> Result<Option<BlobInfo>>;

    /// The store's current epoch.
    async fn current_epoch(&self) -> Result<u64>;

    /// Move the epoch clock forward by one and purge expired blobs.
    /// Returns the new epoch.
    async fn advance_epoch(&self) -> Result<u64>;
}

/// Reject writes the retention model cannot express.
pub(crate) fn check_options(options: &WriteOptions) -> Result<()> {
    if options.epochs == 0 {
        return Err(crate::error::StoreError::WriteRejected(
            "epochs must be at least 1".into(),
        ));
    }
    Ok(())
}

//! # SealGate Store
//!
//! Blob storage for encrypted envelopes. Provides a trait-based interface
//! with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`BlobStore`] - the async trait for all storage operations
//! - [`SqliteBlobStore`] - SQLite-based persistent storage
//! - [`MemoryBlobStore`] - in-memory storage for tests and ephemeral gateways
//! - [`WriteOptions`] - retention epochs and the deletable flag
//! - [`spawn_epoch_clock`] - advances a store's epoch on a timer
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealgate_store::{BlobStore, SqliteBlobStore, WriteOptions};
//!
//! async fn example() {
//!     let store = SqliteBlobStore::open("sealgate.db").unwrap();
//!     let handle = store.write(b"envelope bytes", WriteOptions::default()).await.unwrap();
//!     let bytes = store.read(&handle).await.unwrap();
//!     assert_eq!(bytes, b"envelope bytes");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Pass-through**: stores never interpret envelope bytes
//! - **Content addressing**: the handle is the hex Blake3 of the bytes
//! - **Retention**: blobs expire after their epochs and then read as `NotFound`;
//!   a running gateway drives the epoch with [`spawn_epoch_clock`]

pub mod error;
pub mod memory;
pub mod migration;
pub mod retention;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryBlobStore;
pub use retention::spawn_epoch_clock;
pub use sqlite::SqliteBlobStore;
pub use traits::{BlobInfo, BlobStore, WriteOptions};

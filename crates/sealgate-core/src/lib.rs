//! # SealGate Core
//!
//! Pure primitives shared by every SealGate crate: strong identifier types,
//! key wrappers, canonical encoding and the identifier scheme.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ObjectId`] - 32-byte ledger object id (allowlists, packages)
//! - [`PolicyNamespace`] - the allowlist object governing a class of content
//! - [`ObjectIdentifier`] - `namespace || nonce`, names one encrypted payload
//! - [`Address`] - requester address derived from an Ed25519 public key
//! - [`BlobHandle`] - opaque handle returned by the blob store
//!
//! ## Identifier Scheme
//!
//! ```rust
//! use sealgate_core::{IdentifierScheme, ObjectId, PolicyNamespace};
//!
//! let namespace = PolicyNamespace::new(ObjectId::from_bytes([0xab; 32]));
//! let id = IdentifierScheme::default().derive(&namespace);
//! assert!(id.to_hex().starts_with("abab"));
//! ```

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod identifier;
pub mod types;

pub use canonical::canonical_value_bytes;
pub use crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, Ed25519PublicKey, Ed25519Signature,
    Keypair, SharedKey, X25519PublicKey, X25519StaticSecret,
};
pub use error::{CoreError, Result};
pub use identifier::{IdentifierScheme, DEFAULT_NONCE_LEN, MAX_NONCE_LEN};
pub use types::{Address, BlobHandle, KeyServerId, ObjectId, ObjectIdentifier, PolicyNamespace};

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

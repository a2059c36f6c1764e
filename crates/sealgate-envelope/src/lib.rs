//! # SealGate Envelope
//!
//! Threshold encryption envelopes.
//!
//! ## Encryption Model
//!
//! Content is sealed with a two-layer key model:
//!
//! 1. **Content Key**: derived from a random secret scalar and the identifier,
//!    used with ChaCha20-Poly1305 to encrypt the payload
//! 2. **Share Points**: the secret scalar is Shamir-split; each key server
//!    receives `weight` evaluation points, wrapped to its X25519 key
//!
//! Any `threshold` share points recover the secret. Fewer reveal nothing.
//!
//! ## Key Types
//!
//! - [`EncryptedEnvelope`] - the self-describing sealed object
//! - [`KeyServerPublic`] - a key server's public key and weight
//! - [`WrappedShare`] - one share point encrypted to one recipient
//! - [`SharePoint`] - a plaintext evaluation `(x, f(x))`
//!
//! ## Usage
//!
//! ```rust
//! use sealgate_core::{IdentifierScheme, ObjectId, PolicyNamespace, X25519StaticSecret};
//! use sealgate_envelope::{EncryptedEnvelope, KeyServerPublic, WrapPurpose};
//!
//! let namespace = PolicyNamespace::new(ObjectId::from_bytes([0xab; 32]));
//! let id = IdentifierScheme::default().derive(&namespace);
//!
//! let secret = X25519StaticSecret::generate();
//! let server = KeyServerPublic::new(secret.public_key(), 1);
//!
//! let envelope = EncryptedEnvelope::seal(id.clone(), &[server.clone()], 1, b"hello").unwrap();
//! let points: Vec<_> = envelope
//!     .shares_for(&server.id)
//!     .iter()
//!     .map(|w| w.open(WrapPurpose::ToKeyServer, &id, &secret).unwrap())
//!     .collect();
//!
//! assert_eq!(envelope.open(&points).unwrap(), b"hello");
//! ```

pub mod envelope;
pub mod error;
pub mod keyshare;
pub mod shamir;

pub use envelope::{
    validate_threshold, EncryptedEnvelope, EncryptedPayload, EncryptionFormat, KeyServerPublic,
    ENVELOPE_VERSION,
};
pub use error::{EnvelopeError, Result};
pub use keyshare::{WrapPurpose, WrappedShare};
pub use shamir::{interpolate_at_zero, ShamirPolynomial, SharePoint};

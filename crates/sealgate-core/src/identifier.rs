//! Identifier scheme: policy-scoped identifiers for encrypted payloads.
//!
//! Every upload gets `namespace || nonce` where the nonce is fresh CSPRNG
//! output. The nonce width bounds how many uploads per namespace stay
//! distinguishable: at `n` bytes the birthday bound is roughly `2^(4n)`
//! uploads.

use rand::RngCore;

use crate::types::{ObjectIdentifier, PolicyNamespace};

/// Nonce width used by the reference deployment.
pub const DEFAULT_NONCE_LEN: usize = 5;

/// Upper bound on configurable nonce width.
pub const MAX_NONCE_LEN: usize = 32;

/// Derives fresh identifiers under a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierScheme {
    nonce_len: usize,
}

impl IdentifierScheme {
    /// Create a scheme with the given nonce width, clamped to `1..=MAX_NONCE_LEN`.
    pub fn new(nonce_len: usize) -> Self {
        Self {
            nonce_len: nonce_len.clamp(1, MAX_NONCE_LEN),
        }
    }

    /// The nonce width in bytes.
    pub fn nonce_len(&self) -> usize {
        self.nonce_len
    }

    /// Derive a fresh identifier under `namespace`.
    ///
    /// Reads no shared state, so concurrent uploads never coordinate.
    pub fn derive(&self, namespace: &PolicyNamespace) -> ObjectIdentifier {
        let mut nonce = vec![0u8; self.nonce_len];
        rand::thread_rng().fill_bytes(&mut nonce);
        ObjectIdentifier::new(*namespace, nonce)
    }
}

impl Default for IdentifierScheme {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_LEN)
    }
}

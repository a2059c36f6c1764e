//! Strong type definitions for SealGate.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Ed25519PublicKey, X25519PublicKey};
use crate::error::{CoreError, Result};

/// Parse a 32-byte value from hex, with or without a `0x` prefix.
fn parse_hex_32(s: &str) -> Result<[u8; 32]> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidLength { expected: 32, actual })
}

/// A 32-byte ledger object id.
///
/// Allowlist objects and evaluator packages are both addressed by object id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; 32]);

impl ObjectId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex (the `0x` prefix is optional).
    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex_32(s).map(Self)
    }

    /// The zero object id.
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ObjectId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The allowlist object governing a class of encrypted content.
///
/// Configured once at process start and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyNamespace(ObjectId);

impl PolicyNamespace {
    /// Wrap an allowlist object id.
    pub const fn new(object_id: ObjectId) -> Self {
        Self(object_id)
    }

    /// Parse from hex (the `0x` prefix is optional).
    pub fn from_hex(s: &str) -> Result<Self> {
        ObjectId::from_hex(s).map(Self)
    }

    /// The allowlist object id.
    pub const fn object_id(&self) -> ObjectId {
        self.0
    }

    /// The raw namespace bytes that prefix every identifier.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Width of the namespace prefix in an identifier.
    pub const LEN: usize = 32;
}

impl fmt::Display for PolicyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Names one encrypted payload: `namespace || nonce`.
///
/// Created at upload time and never mutated. The hex form of the
/// concatenation is what clients see as the `sealId`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    namespace: PolicyNamespace,
    nonce: Vec<u8>,
}

impl ObjectIdentifier {
    /// Assemble an identifier from its parts.
    pub fn new(namespace: PolicyNamespace, nonce: Vec<u8>) -> Self {
        Self { namespace, nonce }
    }

    /// The governing namespace.
    pub fn namespace(&self) -> &PolicyNamespace {
        &self.namespace
    }

    /// The per-upload nonce.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// The concatenated `namespace || nonce` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PolicyNamespace::LEN + self.nonce.len());
        buf.extend_from_slice(self.namespace.as_bytes());
        buf.extend_from_slice(&self.nonce);
        buf
    }

    /// Hex of the concatenated bytes (no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Split concatenated bytes back into namespace and nonce.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() <= PolicyNamespace::LEN {
            return Err(CoreError::MalformedIdentifier(format!(
                "identifier must be longer than {} bytes, got {}",
                PolicyNamespace::LEN,
                bytes.len()
            )));
        }
        let (ns, nonce) = bytes.split_at(PolicyNamespace::LEN);
        let mut arr = [0u8; 32];
        arr.copy_from_slice(ns);
        Ok(Self {
            namespace: PolicyNamespace::new(ObjectId(arr)),
            nonce: nonce.to_vec(),
        })
    }

    /// Parse from hex (the `0x` prefix is optional).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        Self::from_bytes(&bytes)
    }

    /// Whether this identifier lives under the given namespace.
    pub fn is_under(&self, namespace: &PolicyNamespace) -> bool {
        &self.namespace == namespace
    }
}

impl fmt::Debug for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectIdentifier({})", self.to_hex())
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A requester address on the ledger.
///
/// Derived from an Ed25519 public key with a domain-separated Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Derive the address controlled by a public key.
    pub fn derive(public_key: &Ed25519PublicKey) -> Self {
        Self(blake3::derive_key("sealgate v1 address", public_key.as_bytes()))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex (the `0x` prefix is optional).
    pub fn from_hex(s: &str) -> Result<Self> {
        parse_hex_32(s).map(Self)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identity of a key server: a domain-separated hash of its X25519 public key.
///
/// Envelopes address wrapped shares by this id, so shares stay bound to the
/// key material they were encrypted for even if endpoints move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyServerId(pub [u8; 32]);

impl KeyServerId {
    /// Derive the id of the server holding `public_key`.
    pub fn derive(public_key: &X25519PublicKey) -> Self {
        Self(blake3::derive_key("sealgate v1 key server", public_key.as_bytes()))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyServerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for KeyServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex()[..16])
    }
}

/// Opaque handle returned by the blob store on write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobHandle(String);

impl BlobHandle {
    /// Wrap a store-issued handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Content-addressed handle for a blob: hex Blake3 of its bytes.
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// The handle as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_object_id_hex_roundtrip() {
        let id = ObjectId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(ObjectId::from_hex(&hex).unwrap(), id);
        assert_eq!(ObjectId::from_hex(&hex[2..]).unwrap(), id);
    }

    #[test]
    fn test_object_id_wrong_length() {
        assert!(matches!(
            ObjectId::from_hex("0xabcd"),
            Err(CoreError::InvalidLength { expected: 32, actual: 2 })
        ));
    }

    #[test]
    fn test_identifier_split() {
        let ns = PolicyNamespace::new(ObjectId::from_bytes([0xab; 32]));
        let id = ObjectIdentifier::new(ns, vec![1, 2, 3, 4, 5]);

        let bytes = id.to_bytes();
        assert_eq!(bytes.len(), 37);
        assert_eq!(&bytes[..32], &[0xab; 32]);

        let recovered = ObjectIdentifier::from_hex(&id.to_hex()).unwrap();
        assert_eq!(recovered, id);
        assert!(recovered.is_under(&ns));
    }

    #[test]
    fn test_identifier_without_nonce_rejected() {
        assert!(ObjectIdentifier::from_bytes(&[0xab; 32]).is_err());
    }

    #[test]
    fn test_address_derivation_deterministic() {
        let kp = Keypair::from_seed(&[7u8; 32]);
        assert_eq!(Address::derive(&kp.public_key()), Address::derive(&kp.public_key()));

        let other = Keypair::from_seed(&[8u8; 32]);
        assert_ne!(Address::derive(&kp.public_key()), Address::derive(&other.public_key()));
    }

    #[test]
    fn test_blob_handle_content_addressed() {
        assert_eq!(BlobHandle::for_content(b"a"), BlobHandle::for_content(b"a"));
        assert_ne!(BlobHandle::for_content(b"a"), BlobHandle::for_content(b"b"));
    }
}

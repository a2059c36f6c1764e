//! Threshold-encrypted envelope.
//!
//! An [`EncryptedEnvelope`] is self-describing: it carries the identifier,
//! the threshold, one wrapped share per key-server evaluation point, and the
//! sealed payload. It is created once, stored verbatim, and can be parsed
//! without any key material to recover the identifier.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use sealgate_core::{
    EncryptionKey, EncryptionNonce, KeyServerId, ObjectIdentifier, X25519PublicKey,
};

use crate::error::{EnvelopeError, Result};
use crate::keyshare::{WrapPurpose, WrappedShare};
use crate::shamir::{interpolate_at_zero, random_scalar, ShamirPolynomial, SharePoint};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Format identifier for the sealed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// The sealed payload inside an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key, authenticating `aad`.
    pub fn encrypt(plaintext: &[u8], aad: &[u8], key: &EncryptionKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt_with_aad(plaintext, aad, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, aad: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key
                .decrypt_with_aad(&self.ciphertext, aad, &self.nonce)
                .map_err(|e| EnvelopeError::Decryption(e.to_string())),
        }
    }
}

/// Public material of one key server as seen by the encrypting side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyServerPublic {
    /// Server identity (derived from the public key).
    pub id: KeyServerId,
    /// X25519 key shares are wrapped to.
    pub public_key: X25519PublicKey,
    /// Number of evaluation points this server holds.
    pub weight: u8,
}

impl KeyServerPublic {
    /// Describe a server by its public key and weight.
    pub fn new(public_key: X25519PublicKey, weight: u8) -> Self {
        Self {
            id: KeyServerId::derive(&public_key),
            public_key,
            weight,
        }
    }
}

/// The self-describing encrypted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Format version.
    pub version: u8,

    /// The identifier this payload was sealed under.
    pub id: ObjectIdentifier,

    /// Number of share points needed to recover the content key.
    pub threshold: u16,

    /// Wrapped shares, one per evaluation point.
    pub shares: Vec<WrappedShare>,

    /// The sealed plaintext.
    pub payload: EncryptedPayload,
}

/// Associated data binding the payload to the envelope header.
fn header_aad(version: u8, id: &ObjectIdentifier, threshold: u16) -> Vec<u8> {
    let mut aad = vec![version];
    aad.extend_from_slice(&threshold.to_le_bytes());
    aad.extend_from_slice(&id.to_bytes());
    aad
}

/// Derive the content key from the shared secret and identifier.
fn content_key(secret: &[u8; 32], id: &ObjectIdentifier) -> EncryptionKey {
    let mut hasher = blake3::Hasher::new_derive_key("sealgate v1 content key");
    hasher.update(secret);
    hasher.update(&id.to_bytes());
    EncryptionKey::from_bytes(*hasher.finalize().as_bytes())
}

/// Check a threshold against a server set and return the total weight.
pub fn validate_threshold(servers: &[KeyServerPublic], threshold: u16) -> Result<u32> {
    if servers.is_empty() {
        return Err(EnvelopeError::NoKeyServers);
    }

    let mut seen = std::collections::HashSet::new();
    let mut total_weight = 0u32;
    for server in servers {
        if server.weight == 0 {
            return Err(EnvelopeError::ZeroWeight(server.id.to_string()));
        }
        if !seen.insert(server.id) {
            return Err(EnvelopeError::DuplicateKeyServer(server.id.to_string()));
        }
        total_weight += server.weight as u32;
    }
    if total_weight > u32::from(u16::MAX) {
        return Err(EnvelopeError::TooManySharePoints(total_weight));
    }

    if threshold == 0 || threshold as u32 > total_weight {
        return Err(EnvelopeError::InvalidThreshold {
            threshold,
            total_weight,
        });
    }

    Ok(total_weight)
}

impl EncryptedEnvelope {
    /// Seal `plaintext` under `id` so any `threshold` share points open it.
    ///
    /// Servers receive consecutive evaluation points starting at 1, `weight`
    /// points each, in the order given.
    pub fn seal(
        id: ObjectIdentifier,
        servers: &[KeyServerPublic],
        threshold: u16,
        plaintext: &[u8],
    ) -> Result<Self> {
        validate_threshold(servers, threshold)?;

        let mut rng = rand::thread_rng();
        let secret = random_scalar(&mut rng);
        let polynomial = ShamirPolynomial::from_secret(secret, threshold, &mut rng)?;

        let mut shares = Vec::new();
        let mut next = 1u32;
        for server in servers {
            for _ in 0..server.weight {
                let x = u16::try_from(next).map_err(|_| EnvelopeError::TooManySharePoints(next))?;
                let point = polynomial.share(x);
                shares.push(WrappedShare::wrap(
                    WrapPurpose::ToKeyServer,
                    server.id,
                    &id,
                    &point,
                    &server.public_key,
                )?);
                next += 1;
            }
        }

        let mut secret_bytes = secret.to_bytes();
        let key = content_key(&secret_bytes, &id);
        secret_bytes.zeroize();

        let aad = header_aad(ENVELOPE_VERSION, &id, threshold);
        let payload = EncryptedPayload::encrypt(plaintext, &aad, &key)?;

        Ok(Self {
            version: ENVELOPE_VERSION,
            id,
            threshold,
            shares,
            payload,
        })
    }

    /// Recover the plaintext from released share points.
    ///
    /// All-or-nothing: either the full plaintext or an error.
    pub fn open(&self, points: &[SharePoint]) -> Result<Vec<u8>> {
        let secret = interpolate_at_zero(points, self.threshold)?;

        let mut secret_bytes = secret.to_bytes();
        let key = content_key(&secret_bytes, &self.id);
        secret_bytes.zeroize();

        let aad = header_aad(self.version, &self.id, self.threshold);
        self.payload.decrypt(&aad, &key)
    }

    /// Wrapped shares addressed to one key server.
    pub fn shares_for(&self, server: &KeyServerId) -> Vec<WrappedShare> {
        self.shares
            .iter()
            .filter(|s| &s.server == server)
            .cloned()
            .collect()
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes, rejecting unknown versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Self =
            ciborium::from_reader(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        if envelope.version != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(envelope.version));
        }
        if envelope.threshold == 0 || envelope.threshold as usize > envelope.shares.len() {
            return Err(EnvelopeError::Malformed(format!(
                "threshold {} with {} shares",
                envelope.threshold,
                envelope.shares.len()
            )));
        }

        Ok(envelope)
    }

    /// Recover the identifier from envelope bytes without key material.
    pub fn parse_id(bytes: &[u8]) -> Result<ObjectIdentifier> {
        Self::from_bytes(bytes).map(|e| e.id)
    }
}

//! Share wrapping via X25519 key agreement.
//!
//! Each share point is encrypted to one recipient's X25519 key with an
//! ephemeral ECDH. At upload the recipient is a key server; at download the
//! key server re-wraps the opened share for the requester's session response
//! key. The wrap key is derived with the identifier and the evaluation point
//! as context, so a wrapped share only opens under the identifier it was
//! sealed for.

use serde::{Deserialize, Serialize};

use sealgate_core::{
    EncryptionNonce, EphemeralKeyPair, KeyServerId, ObjectIdentifier, X25519PublicKey,
    X25519StaticSecret,
};

use crate::error::{EnvelopeError, Result};
use crate::shamir::SharePoint;

/// Who a wrapped share is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WrapPurpose {
    /// Stored in the envelope, opened by a key server.
    ToKeyServer = 1,
    /// Released by a key server, opened by the requester.
    ToRequester = 2,
}

/// A share point encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedShare {
    /// The key server this share belongs to.
    pub server: KeyServerId,

    /// Evaluation point of the wrapped share (public).
    pub point: u16,

    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: X25519PublicKey,

    /// Nonce used for encryption.
    pub nonce: EncryptionNonce,

    /// The share value, encrypted with the derived wrap key.
    pub ciphertext: Vec<u8>,
}

fn wrap_context(purpose: WrapPurpose, server: &KeyServerId, id: &ObjectIdentifier, point: u16) -> Vec<u8> {
    let mut ctx = Vec::with_capacity(1 + 32 + 2 + 64);
    ctx.push(purpose as u8);
    ctx.extend_from_slice(&server.0);
    ctx.extend_from_slice(&point.to_le_bytes());
    ctx.extend_from_slice(&id.to_bytes());
    ctx
}

impl WrappedShare {
    /// Encrypt `share` for `recipient`.
    pub fn wrap(
        purpose: WrapPurpose,
        server: KeyServerId,
        id: &ObjectIdentifier,
        share: &SharePoint,
        recipient: &X25519PublicKey,
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(recipient);

        let wrap_key = shared.derive_encryption_key(&wrap_context(purpose, &server, id, share.x));

        let nonce = EncryptionNonce::generate();
        let ciphertext = wrap_key.encrypt(&share.y, &nonce)?;

        Ok(Self {
            server,
            point: share.x,
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the recipient's secret key.
    pub fn open(
        &self,
        purpose: WrapPurpose,
        id: &ObjectIdentifier,
        recipient: &X25519StaticSecret,
    ) -> Result<SharePoint> {
        let shared = recipient.diffie_hellman(&self.ephemeral_public);
        let wrap_key =
            shared.derive_encryption_key(&wrap_context(purpose, &self.server, id, self.point));

        let bytes = wrap_key
            .decrypt(&self.ciphertext, &self.nonce)
            .map_err(|e| EnvelopeError::InvalidShare(e.to_string()))?;

        let y: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            EnvelopeError::InvalidShare(format!("invalid share length: expected 32, got {}", b.len()))
        })?;

        Ok(SharePoint { x: self.point, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealgate_core::{ObjectId, PolicyNamespace};

    fn id(nonce: u8) -> ObjectIdentifier {
        ObjectIdentifier::new(PolicyNamespace::new(ObjectId::from_bytes([0xab; 32])), vec![nonce; 5])
    }

    fn share() -> SharePoint {
        SharePoint { x: 3, y: [7u8; 32] }
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let secret = X25519StaticSecret::generate();
        let server = KeyServerId::derive(&secret.public_key());

        let wrapped =
            WrappedShare::wrap(WrapPurpose::ToKeyServer, server, &id(1), &share(), &secret.public_key())
                .unwrap();
        let opened = wrapped.open(WrapPurpose::ToKeyServer, &id(1), &secret).unwrap();

        assert_eq!(opened, share());
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let secret = X25519StaticSecret::generate();
        let wrong = X25519StaticSecret::generate();
        let server = KeyServerId::derive(&secret.public_key());

        let wrapped =
            WrappedShare::wrap(WrapPurpose::ToKeyServer, server, &id(1), &share(), &secret.public_key())
                .unwrap();

        assert!(wrapped.open(WrapPurpose::ToKeyServer, &id(1), &wrong).is_err());
    }

    #[test]
    fn test_share_bound_to_identifier() {
        let secret = X25519StaticSecret::generate();
        let server = KeyServerId::derive(&secret.public_key());

        let wrapped =
            WrappedShare::wrap(WrapPurpose::ToKeyServer, server, &id(1), &share(), &secret.public_key())
                .unwrap();

        assert!(wrapped.open(WrapPurpose::ToKeyServer, &id(2), &secret).is_err());
    }

    #[test]
    fn test_share_bound_to_purpose() {
        let secret = X25519StaticSecret::generate();
        let server = KeyServerId::derive(&secret.public_key());

        let wrapped =
            WrappedShare::wrap(WrapPurpose::ToKeyServer, server, &id(1), &share(), &secret.public_key())
                .unwrap();

        assert!(wrapped.open(WrapPurpose::ToRequester, &id(1), &secret).is_err());
    }
}

//! Signer: address derivation and signing.
//!
//! The raw key never leaves process memory. Only signatures, the public key
//! and the derived address are handed out.

use std::fmt;

use sealgate_core::{Address, Ed25519PublicKey, Ed25519Signature, Keypair};

use crate::error::Result;

/// Something that can sign on behalf of one ledger address.
pub trait Signer: Send + Sync {
    /// The signing public key.
    fn public_key(&self) -> Ed25519PublicKey;

    /// The address this signer controls.
    fn address(&self) -> Address {
        Address::derive(&self.public_key())
    }

    /// Sign `message`.
    fn sign(&self, message: &[u8]) -> Result<Ed25519Signature>;
}

/// A signer backed by an in-process Ed25519 keypair.
pub struct KeypairSigner {
    keypair: Keypair,
    address: Address,
}

impl KeypairSigner {
    /// Wrap a keypair.
    pub fn new(keypair: Keypair) -> Self {
        let address = Address::derive(&keypair.public_key());
        Self { keypair, address }
    }

    /// Load from hex seed material (`0x` optional).
    pub fn from_seed_hex(seed: &str) -> Result<Self> {
        Ok(Self::new(Keypair::from_seed_hex(seed)?))
    }

    /// A fresh random signer.
    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }
}

impl Signer for KeypairSigner {
    fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, message: &[u8]) -> Result<Ed25519Signature> {
        Ok(self.keypair.sign(message))
    }
}

impl fmt::Debug for KeypairSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeypairSigner({})", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "0707070707070707070707070707070707070707070707070707070707070707";

    #[test]
    fn test_seed_loading_is_deterministic() {
        let a = KeypairSigner::from_seed_hex(SEED).unwrap();
        let b = KeypairSigner::from_seed_hex(&format!("0x{}", SEED)).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.address(), Address::derive(&a.public_key()));
    }

    #[test]
    fn test_bad_seed_rejected() {
        assert!(KeypairSigner::from_seed_hex("abcd").is_err());
        assert!(KeypairSigner::from_seed_hex("not hex").is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let signer = KeypairSigner::generate();
        let sig = signer.sign(b"message").unwrap();
        assert!(signer.public_key().verify(b"message", &sig).is_ok());
        assert!(signer.public_key().verify(b"other", &sig).is_err());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let signer = KeypairSigner::from_seed_hex(SEED).unwrap();
        let debug = format!("{:?}", signer);
        assert!(debug.contains(&signer.address().to_hex()));
        assert!(!debug.contains(SEED));
    }
}

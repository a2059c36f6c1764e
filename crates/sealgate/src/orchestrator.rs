//! Encryption and decryption orchestrators.
//!
//! Neither touches storage. Encryption is local: derive an identifier and
//! seal to the quorum's public keys. Decryption is all-or-nothing: either
//! enough shares arrive and the payload authenticates, or the caller gets
//! an error and no bytes.

use std::sync::Arc;

use tracing::debug;

use sealgate_core::{IdentifierScheme, PolicyNamespace};
use sealgate_envelope::{EncryptedEnvelope, KeyServerPublic};
use sealgate_keyserver::{FetchOutcome, KeyServerError, KeyServerQuorum};
use sealgate_policy::{CapabilityProof, SessionKey};

use crate::error::{GatewayError, Result};

/// Seals plaintext under fresh identifiers.
pub struct EncryptionOrchestrator {
    scheme: IdentifierScheme,
    servers: Vec<KeyServerPublic>,
    max_plaintext: usize,
}

impl EncryptionOrchestrator {
    /// Seal to `servers`, refusing plaintext over `max_plaintext` bytes.
    pub fn new(scheme: IdentifierScheme, servers: Vec<KeyServerPublic>, max_plaintext: usize) -> Self {
        Self {
            scheme,
            servers,
            max_plaintext,
        }
    }

    /// Derive an identifier under `namespace` and seal `plaintext` to it.
    pub fn encrypt(
        &self,
        namespace: &PolicyNamespace,
        threshold: u16,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope> {
        if plaintext.len() > self.max_plaintext {
            return Err(GatewayError::EncryptionFailure(format!(
                "plaintext is {} bytes, limit is {}",
                plaintext.len(),
                self.max_plaintext
            )));
        }

        let id = self.scheme.derive(namespace);
        debug!(%id, threshold, size = plaintext.len(), "sealing payload");

        EncryptedEnvelope::seal(id, &self.servers, threshold, plaintext)
            .map_err(|e| GatewayError::EncryptionFailure(e.to_string()))
    }
}

/// Opens envelopes through the key-server quorum.
pub struct DecryptionOrchestrator {
    quorum: Arc<KeyServerQuorum>,
}

impl DecryptionOrchestrator {
    /// Decrypt through `quorum`.
    pub fn new(quorum: Arc<KeyServerQuorum>) -> Self {
        Self { quorum }
    }

    /// Recover the plaintext of `envelope_bytes`.
    ///
    /// At least `threshold` share points are collected, or the envelope's
    /// own threshold if that is higher.
    pub async fn decrypt(
        &self,
        envelope_bytes: &[u8],
        session: &SessionKey,
        proof: &CapabilityProof,
        threshold: u16,
    ) -> Result<Vec<u8>> {
        let envelope = EncryptedEnvelope::from_bytes(envelope_bytes)
            .map_err(|e| GatewayError::MalformedEnvelope(e.to_string()))?;

        let needed = threshold.max(envelope.threshold);
        let points = self
            .quorum
            .fetch_shares(&envelope, proof, session, needed)
            .await
            .map_err(|e| match e {
                KeyServerError::InsufficientShares { outcome, .. } => {
                    GatewayError::InsufficientKeyShares { outcome }
                }
                _ => GatewayError::InsufficientKeyShares {
                    outcome: FetchOutcome::Failed,
                },
            })?;

        envelope
            .open(&points)
            .map_err(|e| GatewayError::DecryptionFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealgate_core::{ObjectId, X25519StaticSecret};
    use sealgate_keyserver::{KeyServer, LocalKeyServer, QuorumMember};
    use sealgate_policy::{
        CapabilityBuilder, EntryPoint, KeypairSigner, MemoryLedger, Network, SessionManager,
        Signer,
    };
    use std::time::Duration;

    const PACKAGE: ObjectId = ObjectId::from_bytes([0x11; 32]);
    const ALLOWLIST: ObjectId = ObjectId::from_bytes([0xab; 32]);

    struct Setup {
        ledger: Arc<MemoryLedger>,
        signer: Arc<KeypairSigner>,
        quorum: Arc<KeyServerQuorum>,
    }

    fn setup(servers: usize, threshold: u16) -> Setup {
        let signer = Arc::new(KeypairSigner::generate());
        let ledger = Arc::new(MemoryLedger::new(Network::Localnet));
        ledger.publish_package(PACKAGE);
        ledger.create_allowlist(ALLOWLIST, [signer.address()]);

        let members = (0..servers)
            .map(|i| {
                let secret = X25519StaticSecret::generate();
                let public = KeyServerPublic::new(secret.public_key(), 1);
                let server: Arc<dyn KeyServer> = Arc::new(LocalKeyServer::new(secret, ledger.clone()));
                QuorumMember {
                    name: format!("ks{i}"),
                    server,
                    public,
                }
            })
            .collect();

        Setup {
            quorum: Arc::new(KeyServerQuorum::new(members, threshold).unwrap()),
            ledger,
            signer,
        }
    }

    fn encryptor(setup: &Setup) -> EncryptionOrchestrator {
        EncryptionOrchestrator::new(IdentifierScheme::default(), setup.quorum.servers(), 1024)
    }

    async fn credentials(setup: &Setup, envelope: &EncryptedEnvelope) -> (SessionKey, CapabilityProof) {
        let session = SessionManager::new(setup.signer.clone(), setup.ledger.clone())
            .issue(&setup.signer.address(), &PACKAGE, Duration::from_secs(60))
            .await
            .unwrap();
        let proof = CapabilityBuilder::new(setup.ledger.clone(), EntryPoint::new(PACKAGE))
            .build(&envelope.id, envelope.id.namespace())
            .await
            .unwrap();
        (session, proof)
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt() {
        let setup = setup(3, 2);
        let namespace = PolicyNamespace::new(ALLOWLIST);
        let envelope = encryptor(&setup).encrypt(&namespace, 2, b"ten bytes!").unwrap();
        assert!(envelope.id.is_under(&namespace));

        let (session, proof) = credentials(&setup, &envelope).await;
        let plaintext = DecryptionOrchestrator::new(setup.quorum.clone())
            .decrypt(&envelope.to_bytes().unwrap(), &session, &proof, 2)
            .await
            .unwrap();
        assert_eq!(plaintext, b"ten bytes!");
    }

    #[test]
    fn test_threshold_above_server_count_fails() {
        let setup = setup(3, 2);
        let result = encryptor(&setup).encrypt(&PolicyNamespace::new(ALLOWLIST), 5, b"x");
        assert!(matches!(result, Err(GatewayError::EncryptionFailure(_))));
    }

    #[test]
    fn test_oversized_plaintext_fails() {
        let setup = setup(1, 1);
        let result = encryptor(&setup).encrypt(&PolicyNamespace::new(ALLOWLIST), 1, &[0u8; 1025]);
        assert!(matches!(result, Err(GatewayError::EncryptionFailure(_))));
    }

    #[test]
    fn test_identifiers_differ_per_upload() {
        let setup = setup(1, 1);
        let namespace = PolicyNamespace::new(ALLOWLIST);
        let a = encryptor(&setup).encrypt(&namespace, 1, b"same").unwrap();
        let b = encryptor(&setup).encrypt(&namespace, 1, b"same").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let setup = setup(1, 1);
        let envelope = encryptor(&setup)
            .encrypt(&PolicyNamespace::new(ALLOWLIST), 1, b"x")
            .unwrap();
        let (session, proof) = credentials(&setup, &envelope).await;

        let result = DecryptionOrchestrator::new(setup.quorum.clone())
            .decrypt(b"definitely not an envelope", &session, &proof, 1)
            .await;
        assert!(matches!(result, Err(GatewayError::MalformedEnvelope(_))));
    }

    #[tokio::test]
    async fn test_denial_is_insufficient_shares() {
        let setup = setup(3, 2);
        let envelope = encryptor(&setup)
            .encrypt(&PolicyNamespace::new(ALLOWLIST), 2, b"secret")
            .unwrap();
        let (session, proof) = credentials(&setup, &envelope).await;
        setup.ledger.remove_member(&ALLOWLIST, &setup.signer.address());

        let result = DecryptionOrchestrator::new(setup.quorum.clone())
            .decrypt(&envelope.to_bytes().unwrap(), &session, &proof, 2)
            .await;
        assert!(matches!(
            result,
            Err(GatewayError::InsufficientKeyShares {
                outcome: FetchOutcome::Denied
            })
        ));
    }

    #[tokio::test]
    async fn test_caller_threshold_can_raise_requirement() {
        let setup = setup(2, 1);
        let envelope = encryptor(&setup)
            .encrypt(&PolicyNamespace::new(ALLOWLIST), 1, b"secret")
            .unwrap();
        let (session, proof) = credentials(&setup, &envelope).await;

        // One server per point, so asking for three can never be met
        let result = DecryptionOrchestrator::new(setup.quorum.clone())
            .decrypt(&envelope.to_bytes().unwrap(), &session, &proof, 3)
            .await;
        assert!(matches!(result, Err(GatewayError::InsufficientKeyShares { .. })));
    }
}

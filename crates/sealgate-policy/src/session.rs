//! Session Credential Manager.
//!
//! A session credential is a signed, time-boxed attestation that `address`
//! wants key material released for identifiers governed by `package_id`.
//! It carries a fresh X25519 response key: key servers re-wrap released
//! shares to it, so only the process holding the matching [`SessionKey`]
//! can open them. Credentials live in memory for one request and are never
//! persisted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sealgate_core::{
    canonical_value_bytes, now_millis, Address, Ed25519PublicKey, Ed25519Signature, ObjectId,
    X25519PublicKey, X25519StaticSecret,
};

use crate::error::{PolicyError, Result};
use crate::ledger::LedgerClient;
use crate::signer::Signer;

/// Signed `{ address, package id, issued_at, ttl }` attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub address: Address,
    pub package_id: ObjectId,
    /// Issuance time (Unix ms).
    pub issued_at: i64,
    /// Lifetime in milliseconds.
    pub ttl_ms: u64,
    /// Key servers wrap released shares to this key.
    pub response_key: X25519PublicKey,
    /// Key that produced `signature`; `address` must derive from it.
    pub signer: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

fn claims_bytes(
    address: &Address,
    package_id: &ObjectId,
    issued_at: i64,
    ttl_ms: u64,
    response_key: &X25519PublicKey,
    signer: &Ed25519PublicKey,
) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (Value::Text("domain".into()), Value::Text("sealgate session v1".into())),
        (Value::Text("address".into()), Value::Bytes(address.as_bytes().to_vec())),
        (Value::Text("package_id".into()), Value::Bytes(package_id.as_bytes().to_vec())),
        (Value::Text("issued_at".into()), Value::Integer(issued_at.into())),
        (Value::Text("ttl_ms".into()), Value::Integer(ttl_ms.into())),
        (Value::Text("response_key".into()), Value::Bytes(response_key.as_bytes().to_vec())),
        (Value::Text("signer".into()), Value::Bytes(signer.as_bytes().to_vec())),
    ]);
    Ok(canonical_value_bytes(&value)?)
}

impl SessionCredential {
    /// The canonical bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        claims_bytes(
            &self.address,
            &self.package_id,
            self.issued_at,
            self.ttl_ms,
            &self.response_key,
            &self.signer,
        )
    }

    /// First instant (Unix ms) at which the credential is no longer valid.
    pub fn expires_at(&self) -> i64 {
        self.issued_at
            .saturating_add(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX))
    }

    /// Whether `now` lies in `[issued_at, issued_at + ttl)`.
    pub fn is_live_at(&self, now: i64) -> bool {
        self.issued_at <= now && now < self.expires_at()
    }

    /// Time left at `now`; zero once expired.
    pub fn remaining_at(&self, now: i64) -> Duration {
        Duration::from_millis(self.expires_at().saturating_sub(now).max(0) as u64)
    }

    /// Check signature, address binding and the validity window at `now`.
    pub fn verify(&self, now: i64) -> Result<()> {
        if Address::derive(&self.signer) != self.address {
            return Err(PolicyError::InvalidCredential(
                "address is not controlled by the signing key".into(),
            ));
        }

        self.signer
            .verify(&self.signing_bytes()?, &self.signature)
            .map_err(|e| PolicyError::InvalidCredential(e.to_string()))?;

        if !self.is_live_at(now) {
            return Err(PolicyError::CredentialExpired {
                expires_at: self.expires_at(),
                now,
            });
        }

        Ok(())
    }
}

/// A credential together with the secret half of its response key.
pub struct SessionKey {
    credential: SessionCredential,
    response_secret: X25519StaticSecret,
}

impl SessionKey {
    /// The credential to present to key servers.
    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    /// The secret that opens shares released under this credential.
    pub fn response_secret(&self) -> &X25519StaticSecret {
        &self.response_secret
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.credential.address)
            .field("expires_at", &self.credential.expires_at())
            .finish_non_exhaustive()
    }
}

/// Issues session credentials with an explicit signer and ledger.
pub struct SessionManager {
    signer: Arc<dyn Signer>,
    ledger: Arc<dyn LedgerClient>,
}

impl SessionManager {
    /// Create a manager.
    pub fn new(signer: Arc<dyn Signer>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { signer, ledger }
    }

    /// The address credentials are issued for.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Issue a credential valid from now for `ttl`.
    pub async fn issue(
        &self,
        address: &Address,
        package_id: &ObjectId,
        ttl: Duration,
    ) -> Result<SessionKey> {
        self.issue_at(address, package_id, ttl, now_millis()).await
    }

    /// Issue a credential valid from `issued_at` (Unix ms) for `ttl`.
    pub async fn issue_at(
        &self,
        address: &Address,
        package_id: &ObjectId,
        ttl: Duration,
        issued_at: i64,
    ) -> Result<SessionKey> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if ttl_ms == 0 || ttl_ms > i64::MAX as u64 {
            return Err(PolicyError::InvalidTtl(ttl_ms));
        }

        let signer_address = self.signer.address();
        if &signer_address != address {
            return Err(PolicyError::AddressMismatch {
                signer: signer_address.to_hex(),
                requested: address.to_hex(),
            });
        }

        // The evaluator package must exist for key servers to simulate against it
        self.ledger.resolve_object(package_id).await?;

        let response_secret = X25519StaticSecret::generate();
        let response_key = response_secret.public_key();
        let signer = self.signer.public_key();

        let message = claims_bytes(address, package_id, issued_at, ttl_ms, &response_key, &signer)?;
        let signature = self.signer.sign(&message)?;

        let credential = SessionCredential {
            address: *address,
            package_id: *package_id,
            issued_at,
            ttl_ms,
            response_key,
            signer,
            signature,
        };

        debug!(
            address = %credential.address,
            package = %credential.package_id,
            expires_at = credential.expires_at(),
            "issued session credential"
        );

        Ok(SessionKey {
            credential,
            response_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Network;
    use crate::memory::MemoryLedger;
    use crate::signer::KeypairSigner;

    const PACKAGE: ObjectId = ObjectId::from_bytes([0x11; 32]);
    const TTL: Duration = Duration::from_secs(600);

    fn manager() -> (SessionManager, Arc<KeypairSigner>, Arc<MemoryLedger>) {
        let signer = Arc::new(KeypairSigner::generate());
        let ledger = Arc::new(MemoryLedger::new(Network::Testnet));
        ledger.publish_package(PACKAGE);
        (
            SessionManager::new(signer.clone(), ledger.clone()),
            signer,
            ledger,
        )
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let (manager, signer, _) = manager();
        let key = manager.issue(&signer.address(), &PACKAGE, TTL).await.unwrap();

        let credential = key.credential();
        assert_eq!(credential.address, signer.address());
        assert_eq!(credential.ttl_ms, 600_000);
        assert_eq!(credential.response_key, key.response_secret().public_key());
        assert!(credential.verify(now_millis()).is_ok());
    }

    #[tokio::test]
    async fn test_validity_window_is_half_open() {
        let (manager, signer, _) = manager();
        let key = manager
            .issue_at(&signer.address(), &PACKAGE, TTL, 1_000)
            .await
            .unwrap();
        let credential = key.credential();

        assert!(credential.verify(1_000).is_ok());
        assert!(credential.verify(600_999).is_ok());
        assert!(matches!(
            credential.verify(601_000),
            Err(PolicyError::CredentialExpired { expires_at: 601_000, now: 601_000 })
        ));
        assert!(credential.verify(999).is_err());
        assert_eq!(credential.remaining_at(600_000), Duration::from_millis(1_000));
        assert_eq!(credential.remaining_at(700_000), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_tampered_credential_rejected() {
        let (manager, signer, _) = manager();
        let key = manager.issue(&signer.address(), &PACKAGE, TTL).await.unwrap();

        let mut extended = key.credential().clone();
        extended.ttl_ms *= 10;
        assert!(matches!(
            extended.verify(now_millis()),
            Err(PolicyError::InvalidCredential(_))
        ));

        let mut swapped = key.credential().clone();
        swapped.response_key = X25519StaticSecret::generate().public_key();
        assert!(swapped.verify(now_millis()).is_err());
    }

    #[tokio::test]
    async fn test_foreign_address_refused() {
        let (manager, _, _) = manager();
        let other = KeypairSigner::generate().address();

        assert!(matches!(
            manager.issue(&other, &PACKAGE, TTL).await,
            Err(PolicyError::AddressMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_package_refused() {
        let (manager, signer, _) = manager();
        let result = manager
            .issue(&signer.address(), &ObjectId::from_bytes([0x99; 32]), TTL)
            .await;
        assert!(matches!(result, Err(PolicyError::ObjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_ledger_offline_fails_issuance() {
        let (manager, signer, ledger) = manager();
        ledger.set_offline(true);
        assert!(matches!(
            manager.issue(&signer.address(), &PACKAGE, TTL).await,
            Err(PolicyError::LedgerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_ttl_refused() {
        let (manager, signer, _) = manager();
        assert!(matches!(
            manager.issue(&signer.address(), &PACKAGE, Duration::ZERO).await,
            Err(PolicyError::InvalidTtl(0))
        ));
    }

    #[test]
    fn test_credential_cbor_roundtrip_keeps_signature_valid() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (manager, signer, _) = manager();
        let key = rt
            .block_on(manager.issue(&signer.address(), &PACKAGE, TTL))
            .unwrap();

        let mut buf = Vec::new();
        ciborium::into_writer(key.credential(), &mut buf).unwrap();
        let decoded: SessionCredential = ciborium::from_reader(&buf[..]).unwrap();

        assert_eq!(&decoded, key.credential());
        assert!(decoded.verify(now_millis()).is_ok());
    }
}

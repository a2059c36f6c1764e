//! Key servers.
//!
//! A key server holds one X25519 secret. It releases its shares of an
//! envelope only after the requester's credential checks out and the
//! capability proof passes simulation on the server's own ledger view.
//! Released shares are re-wrapped to the credential's response key.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sealgate_core::{now_millis, KeyServerId, X25519StaticSecret};
use sealgate_envelope::{WrapPurpose, WrappedShare};
use sealgate_policy::{
    EntryPoint, LedgerClient, PolicyError, SimulationOutcome, DEFAULT_FUNCTION, DEFAULT_MODULE,
};

use crate::error::{KeyServerError, Result};
use crate::messages::{ErrorCode, FetchKeyRequest, FetchKeyResponse, ServiceInfo};

/// The key-server protocol, local or remote.
#[async_trait]
pub trait KeyServer: Send + Sync {
    /// Describe the server.
    async fn service_info(&self) -> Result<ServiceInfo>;

    /// Release shares for one request, or refuse.
    async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse>;
}

/// An in-process key server.
pub struct LocalKeyServer {
    secret: X25519StaticSecret,
    info: ServiceInfo,
    ledger: Arc<dyn LedgerClient>,
    module: String,
    function: String,
}

impl LocalKeyServer {
    /// Create a key server evaluating proofs against `ledger`.
    pub fn new(secret: X25519StaticSecret, ledger: Arc<dyn LedgerClient>) -> Self {
        let public_key = secret.public_key();
        let info = ServiceInfo {
            server_id: KeyServerId::derive(&public_key),
            public_key,
            network: ledger.network(),
        };
        Self {
            secret,
            info,
            ledger,
            module: DEFAULT_MODULE.to_string(),
            function: DEFAULT_FUNCTION.to_string(),
        }
    }

    /// Accept proofs calling `module::function` instead of the defaults.
    pub fn with_entry_names(mut self, module: impl Into<String>, function: impl Into<String>) -> Self {
        self.module = module.into();
        self.function = function.into();
        self
    }

    /// This server's id.
    pub fn id(&self) -> KeyServerId {
        self.info.server_id
    }

    fn check_credential(&self, request: &FetchKeyRequest, now: i64) -> Result<()> {
        request.credential.verify(now).map_err(|e| match e {
            PolicyError::CredentialExpired { .. } => {
                KeyServerError::rejected(ErrorCode::Expired, e.to_string())
            }
            other => KeyServerError::rejected(ErrorCode::InvalidCredential, other.to_string()),
        })
    }

    fn check_proof(&self, request: &FetchKeyRequest) -> Result<()> {
        let entry = EntryPoint {
            package: request.credential.package_id,
            module: self.module.clone(),
            function: self.function.clone(),
        };
        request
            .proof
            .check_targets(&entry, &request.id)
            .map_err(|e| KeyServerError::rejected(ErrorCode::InvalidProof, e.to_string()))
    }

    fn rewrap(&self, request: &FetchKeyRequest) -> Result<Vec<WrappedShare>> {
        let ours: Vec<_> = request
            .shares
            .iter()
            .filter(|s| s.server == self.info.server_id)
            .collect();

        if ours.is_empty() {
            return Err(KeyServerError::rejected(
                ErrorCode::InvalidProof,
                "no shares addressed to this server",
            ));
        }

        ours.into_iter()
            .map(|wrapped| {
                let point = wrapped
                    .open(WrapPurpose::ToKeyServer, &request.id, &self.secret)
                    .map_err(|e| KeyServerError::rejected(ErrorCode::InvalidProof, e.to_string()))?;
                Ok(WrappedShare::wrap(
                    WrapPurpose::ToRequester,
                    self.info.server_id,
                    &request.id,
                    &point,
                    &request.credential.response_key,
                )?)
            })
            .collect()
    }
}

#[async_trait]
impl KeyServer for LocalKeyServer {
    async fn service_info(&self) -> Result<ServiceInfo> {
        Ok(self.info.clone())
    }

    async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse> {
        let server = self.info.server_id;
        let requester = request.credential.address;

        self.check_credential(request, now_millis())?;
        self.check_proof(request)?;

        let outcome = self
            .ledger
            .simulate(request.proof.as_bytes(), &requester)
            .await
            .map_err(|e| KeyServerError::rejected(ErrorCode::Unavailable, e.to_string()))?;

        if let SimulationOutcome::Rejected { reason } = outcome {
            warn!(%server, %requester, id = %request.id, %reason, "policy denied key release");
            return Err(KeyServerError::rejected(ErrorCode::Denied, "policy denied"));
        }

        let shares = self.rewrap(request)?;
        debug!(%server, count = shares.len(), "re-wrapped shares for requester");
        info!(%server, %requester, id = %request.id, "released key shares");

        Ok(FetchKeyResponse { shares })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealgate_core::{ObjectId, ObjectIdentifier, PolicyNamespace};
    use sealgate_envelope::{EncryptedEnvelope, KeyServerPublic};
    use sealgate_policy::{
        CapabilityBuilder, KeypairSigner, MemoryLedger, Network, SessionKey, SessionManager,
        Signer,
    };
    use std::time::Duration;

    const PACKAGE: ObjectId = ObjectId::from_bytes([0x11; 32]);
    const ALLOWLIST: ObjectId = ObjectId::from_bytes([0xab; 32]);

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        signer: Arc<KeypairSigner>,
        server: LocalKeyServer,
        envelope: EncryptedEnvelope,
    }

    impl Fixture {
        fn new() -> Self {
            let signer = Arc::new(KeypairSigner::generate());
            let ledger = Arc::new(MemoryLedger::new(Network::Localnet));
            ledger.publish_package(PACKAGE);
            ledger.create_allowlist(ALLOWLIST, [signer.address()]);

            let server = LocalKeyServer::new(X25519StaticSecret::generate(), ledger.clone());
            let public = KeyServerPublic::new(server.info.public_key, 1);
            let id = ObjectIdentifier::new(PolicyNamespace::new(ALLOWLIST), vec![3; 5]);
            let envelope = EncryptedEnvelope::seal(id, &[public], 1, b"secret").unwrap();

            Self {
                ledger,
                signer,
                server,
                envelope,
            }
        }

        async fn session_at(&self, issued_at: i64) -> SessionKey {
            SessionManager::new(self.signer.clone(), self.ledger.clone())
                .issue_at(&self.signer.address(), &PACKAGE, Duration::from_secs(60), issued_at)
                .await
                .unwrap()
        }

        async fn request(&self, session: &SessionKey) -> FetchKeyRequest {
            let id = self.envelope.id.clone();
            let proof = CapabilityBuilder::new(self.ledger.clone(), EntryPoint::new(PACKAGE))
                .build(&id, &PolicyNamespace::new(ALLOWLIST))
                .await
                .unwrap();
            FetchKeyRequest {
                shares: self.envelope.shares_for(&self.server.id()),
                id,
                proof,
                credential: session.credential().clone(),
            }
        }
    }

    #[tokio::test]
    async fn test_releases_shares_to_requester() {
        let fx = Fixture::new();
        let session = fx.session_at(now_millis()).await;
        let request = fx.request(&session).await;

        let response = fx.server.fetch_key(&request).await.unwrap();
        let points: Vec<_> = response
            .shares
            .iter()
            .map(|w| {
                w.open(WrapPurpose::ToRequester, &request.id, session.response_secret())
                    .unwrap()
            })
            .collect();

        assert_eq!(fx.envelope.open(&points).unwrap(), b"secret");
    }

    #[tokio::test]
    async fn test_denied_when_not_on_allowlist() {
        let fx = Fixture::new();
        fx.ledger.remove_member(&ALLOWLIST, &fx.signer.address());
        let session = fx.session_at(now_millis()).await;
        let request = fx.request(&session).await;

        let err = fx.server.fetch_key(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Denied);
    }

    #[tokio::test]
    async fn test_expired_credential_refused() {
        let fx = Fixture::new();
        let session = fx.session_at(now_millis() - 120_000).await;
        let request = fx.request(&session).await;

        let err = fx.server.fetch_key(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Expired);
    }

    #[tokio::test]
    async fn test_forged_credential_refused() {
        let fx = Fixture::new();
        let session = fx.session_at(now_millis()).await;
        let mut request = fx.request(&session).await;
        request.credential.ttl_ms = u64::MAX / 4;

        let err = fx.server.fetch_key(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCredential);
    }

    #[tokio::test]
    async fn test_proof_for_other_identifier_refused() {
        let fx = Fixture::new();
        let session = fx.session_at(now_millis()).await;
        let mut request = fx.request(&session).await;
        request.id = ObjectIdentifier::new(PolicyNamespace::new(ALLOWLIST), vec![4; 5]);

        let err = fx.server.fetch_key(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidProof);
    }

    #[tokio::test]
    async fn test_no_shares_for_this_server() {
        let fx = Fixture::new();
        let session = fx.session_at(now_millis()).await;
        let mut request = fx.request(&session).await;
        request.shares.clear();

        let err = fx.server.fetch_key(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidProof);
    }

    #[tokio::test]
    async fn test_ledger_offline_is_unavailable() {
        let fx = Fixture::new();
        let session = fx.session_at(now_millis()).await;
        let request = fx.request(&session).await;
        fx.ledger.set_offline(true);

        let err = fx.server.fetch_key(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }
}

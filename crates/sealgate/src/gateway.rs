//! The gateway: upload and download flows over the orchestrators.
//!
//! Upload seals under the configured namespace and stores the envelope.
//! Download reads it back, issues a session credential, builds the
//! capability proof for the stored identifier and decrypts through the
//! quorum. Each download walks the states of [`DownloadState`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sealgate_core::{
    Address, BlobHandle, IdentifierScheme, ObjectIdentifier, PolicyNamespace, DEFAULT_NONCE_LEN,
};
use sealgate_envelope::EncryptedEnvelope;
use sealgate_keyserver::{FetchOutcome, HttpKeyServer, KeyServer, KeyServerQuorum, MemberConfig};
use sealgate_policy::{CapabilityBuilder, EntryPoint, LedgerClient, SessionManager, Signer};
use sealgate_store::{BlobStore, MemoryBlobStore, SqliteBlobStore, StoreError, WriteOptions};

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::orchestrator::{DecryptionOrchestrator, EncryptionOrchestrator};

/// Runtime settings of a gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Namespace uploads are sealed under.
    pub namespace: PolicyNamespace,
    /// Approval entry point proofs call.
    pub entry_point: EntryPoint,
    /// Credential lifetime.
    pub ttl: Duration,
    pub nonce_len: usize,
    pub max_upload_bytes: usize,
    pub write: WriteOptions,
}

impl GatewaySettings {
    /// Defaults for `namespace`, calling the default entry point of `entry_point`'s package.
    pub fn new(namespace: PolicyNamespace, entry_point: EntryPoint) -> Self {
        Self {
            namespace,
            entry_point,
            ttl: Duration::from_secs(10 * 60),
            nonce_len: DEFAULT_NONCE_LEN,
            max_upload_bytes: 10 * 1024 * 1024,
            write: WriteOptions::default(),
        }
    }
}

/// What the gateway talks to.
pub struct Collaborators {
    pub signer: Arc<dyn Signer>,
    pub ledger: Arc<dyn LedgerClient>,
    pub quorum: Arc<KeyServerQuorum>,
    pub store: Arc<dyn BlobStore>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub blob_id: BlobHandle,
    pub seal_id: ObjectIdentifier,
}

/// Where a download is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Fetched,
    CredentialIssued,
    ProofBuilt,
    AwaitingShares,
    Decrypted,
    Denied,
    Expired,
    Failed,
}

impl DownloadState {
    /// Terminal state for a finished download.
    pub fn terminal(result: &Result<Vec<u8>>) -> Self {
        match result {
            Ok(_) => DownloadState::Decrypted,
            Err(GatewayError::InsufficientKeyShares { outcome }) => match outcome {
                FetchOutcome::Denied => DownloadState::Denied,
                FetchOutcome::Expired => DownloadState::Expired,
                FetchOutcome::Failed => DownloadState::Failed,
            },
            Err(_) => DownloadState::Failed,
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DownloadState::Fetched => "fetched",
            DownloadState::CredentialIssued => "credential_issued",
            DownloadState::ProofBuilt => "proof_built",
            DownloadState::AwaitingShares => "awaiting_shares",
            DownloadState::Decrypted => "decrypted",
            DownloadState::Denied => "denied",
            DownloadState::Expired => "expired",
            DownloadState::Failed => "failed",
        })
    }
}

/// Upload and download over one deployment.
pub struct Gateway {
    settings: GatewaySettings,
    address: Address,
    quorum: Arc<KeyServerQuorum>,
    store: Arc<dyn BlobStore>,
    encryptor: EncryptionOrchestrator,
    decryptor: DecryptionOrchestrator,
    sessions: SessionManager,
    capabilities: CapabilityBuilder,
}

impl Gateway {
    /// Assemble a gateway.
    pub fn new(settings: GatewaySettings, parts: Collaborators) -> Self {
        let encryptor = EncryptionOrchestrator::new(
            IdentifierScheme::new(settings.nonce_len),
            parts.quorum.servers(),
            settings.max_upload_bytes,
        );
        let decryptor = DecryptionOrchestrator::new(parts.quorum.clone());
        let sessions = SessionManager::new(parts.signer.clone(), parts.ledger.clone());
        let capabilities = CapabilityBuilder::new(parts.ledger, settings.entry_point.clone());

        Self {
            address: parts.signer.address(),
            quorum: parts.quorum,
            store: parts.store,
            encryptor,
            decryptor,
            sessions,
            capabilities,
            settings,
        }
    }

    /// Assemble a gateway from configuration, contacting every key server.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate_gateway()?;

        let mut members = Vec::new();
        for endpoint in config.endpoints()? {
            let server: Arc<dyn KeyServer> = Arc::new(
                HttpKeyServer::new(endpoint.url.clone())
                    .map_err(|e| GatewayError::Config(e.to_string()))?,
            );
            members.push(MemberConfig {
                name: endpoint.url,
                server,
                public_key: endpoint.public_key,
                weight: endpoint.weight,
            });
        }

        let quorum = KeyServerQuorum::connect(
            members,
            config.key_servers.threshold,
            config.network()?,
            config.key_servers.verify_servers,
        )
        .await
        .map_err(|e| GatewayError::Config(e.to_string()))?;

        let store: Arc<dyn BlobStore> = match &config.storage.path {
            Some(path) => Arc::new(
                SqliteBlobStore::open(path).map_err(|e| GatewayError::Config(e.to_string()))?,
            ),
            None => Arc::new(MemoryBlobStore::new()),
        };

        let settings = GatewaySettings {
            namespace: config.namespace()?,
            entry_point: config.entry_point()?,
            ttl: config.ttl()?,
            nonce_len: config.policy.nonce_len,
            max_upload_bytes: config.gateway.max_upload_bytes,
            write: config.write_options()?,
        };

        Ok(Self::new(
            settings,
            Collaborators {
                signer: Arc::new(config.signer()?),
                ledger: Arc::new(config.ledger()?),
                quorum: Arc::new(quorum),
                store,
            },
        ))
    }

    /// The settings in use.
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// The address credentials are issued for.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Advance the blob store's epoch every `period` until the handle is aborted.
    pub async fn start_epoch_clock(&self, period: Duration) -> Result<JoinHandle<()>> {
        let epoch = self
            .store
            .current_epoch()
            .await
            .map_err(|e| GatewayError::StorageReadFailure(e.to_string()))?;
        info!(epoch, period_secs = period.as_secs(), "storage epoch clock started");
        Ok(sealgate_store::spawn_epoch_clock(self.store.clone(), period))
    }

    /// Seal `plaintext` and store the envelope.
    pub async fn upload(&self, plaintext: &[u8]) -> Result<UploadReceipt> {
        let envelope =
            self.encryptor
                .encrypt(&self.settings.namespace, self.quorum.threshold(), plaintext)?;
        let bytes = envelope
            .to_bytes()
            .map_err(|e| GatewayError::EncryptionFailure(e.to_string()))?;

        let blob_id = self
            .store
            .write(&bytes, self.settings.write)
            .await
            .map_err(|e| GatewayError::StorageWriteFailure(e.to_string()))?;

        let end_epoch = match self.store.info(&blob_id).await {
            Ok(info) => info.map(|i| i.end_epoch),
            Err(e) => {
                warn!(blob = %blob_id, error = %e, "stored blob has no metadata");
                None
            }
        };
        info!(
            blob = %blob_id,
            seal_id = %envelope.id,
            size = plaintext.len(),
            end_epoch = ?end_epoch,
            "upload stored"
        );

        Ok(UploadReceipt {
            blob_id,
            seal_id: envelope.id,
        })
    }

    /// Fetch, authorize and decrypt the blob `blob_id`.
    pub async fn download(&self, blob_id: &BlobHandle) -> Result<Vec<u8>> {
        let result = self.run_download(blob_id).await;

        match &result {
            Ok(plaintext) => info!(
                blob = %blob_id,
                state = %DownloadState::Decrypted,
                size = plaintext.len(),
                "download finished"
            ),
            Err(e) => warn!(
                blob = %blob_id,
                state = %DownloadState::terminal(&result),
                error = %e,
                "download failed"
            ),
        }

        result
    }

    async fn run_download(&self, blob_id: &BlobHandle) -> Result<Vec<u8>> {
        let bytes = self.store.read(blob_id).await.map_err(|e| match e {
            StoreError::NotFound(handle) => GatewayError::NotFound(handle),
            other => GatewayError::StorageReadFailure(other.to_string()),
        })?;
        debug!(blob = %blob_id, state = %DownloadState::Fetched, size = bytes.len(), "download state");

        let id = EncryptedEnvelope::parse_id(&bytes)
            .map_err(|e| GatewayError::MalformedEnvelope(e.to_string()))?;

        let session = self
            .sessions
            .issue(&self.address, &self.settings.entry_point.package, self.settings.ttl)
            .await
            .map_err(|e| GatewayError::CredentialIssuanceFailure(e.to_string()))?;
        debug!(blob = %blob_id, state = %DownloadState::CredentialIssued, address = %self.address, "download state");

        let proof = self
            .capabilities
            .build(&id, id.namespace())
            .await
            .map_err(|e| GatewayError::ProofConstructionFailure(e.to_string()))?;
        debug!(blob = %blob_id, state = %DownloadState::ProofBuilt, %id, "download state");

        debug!(blob = %blob_id, state = %DownloadState::AwaitingShares, threshold = self.quorum.threshold(), "download state");
        self.decryptor
            .decrypt(&bytes, &session, &proof, self.quorum.threshold())
            .await
    }
}

//! Test fixtures.
//!
//! A [`LocalDeployment`] is a complete deployment in one process: a ledger
//! with the evaluator package and one allowlist, N key servers sharing that
//! ledger view, a signer, a blob store and the quorum over the servers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sealgate::{Collaborators, Gateway, GatewaySettings};
use sealgate_core::{ObjectId, PolicyNamespace, X25519PublicKey, X25519StaticSecret};
use sealgate_envelope::KeyServerPublic;
use sealgate_keyserver::{
    FetchKeyRequest, FetchKeyResponse, KeyServer, KeyServerError, KeyServerQuorum, LocalKeyServer,
    QuorumMember, ServiceInfo,
};
use sealgate_policy::{
    CapabilityBuilder, CapabilityProof, EntryPoint, KeypairSigner, MemoryLedger, Network,
    SessionKey, SessionManager, Signer,
};
use sealgate_store::MemoryBlobStore;

/// Evaluator package id used by fixtures.
pub const TEST_PACKAGE: ObjectId = ObjectId::from_bytes([0x11; 32]);

/// Allowlist id used by fixtures, `0xabab..`.
pub const TEST_NAMESPACE: ObjectId = ObjectId::from_bytes([0xab; 32]);

/// A key server that cannot be reached.
pub struct UnreachableKeyServer {
    public_key: X25519PublicKey,
}

impl UnreachableKeyServer {
    pub fn new(public_key: X25519PublicKey) -> Self {
        Self { public_key }
    }
}

#[async_trait]
impl KeyServer for UnreachableKeyServer {
    async fn service_info(&self) -> sealgate_keyserver::Result<ServiceInfo> {
        Err(KeyServerError::Transport(format!(
            "connection refused ({})",
            self.public_key.to_hex()
        )))
    }

    async fn fetch_key(&self, _request: &FetchKeyRequest) -> sealgate_keyserver::Result<FetchKeyResponse> {
        Err(KeyServerError::Transport("connection refused".into()))
    }
}

/// A key server that accepts requests and never answers.
pub struct HangingKeyServer;

#[async_trait]
impl KeyServer for HangingKeyServer {
    async fn service_info(&self) -> sealgate_keyserver::Result<ServiceInfo> {
        std::future::pending().await
    }

    async fn fetch_key(&self, _request: &FetchKeyRequest) -> sealgate_keyserver::Result<FetchKeyResponse> {
        std::future::pending().await
    }
}

/// How a fixture key server behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerBehavior {
    Honest,
    Unreachable,
    Hanging,
}

/// Builder for [`LocalDeployment`].
#[derive(Debug, Clone)]
pub struct DeploymentBuilder {
    behaviors: Vec<ServerBehavior>,
    weights: Vec<u8>,
    threshold: u16,
    member: bool,
    network: Network,
}

impl DeploymentBuilder {
    /// `servers` honest key servers of weight 1.
    pub fn new(servers: usize, threshold: u16) -> Self {
        Self {
            behaviors: vec![ServerBehavior::Honest; servers],
            weights: vec![1; servers],
            threshold,
            member: true,
            network: Network::Localnet,
        }
    }

    /// Make server `index` behave as given.
    pub fn server(mut self, index: usize, behavior: ServerBehavior) -> Self {
        self.behaviors[index] = behavior;
        self
    }

    /// Give server `index` weight `weight`.
    pub fn weight(mut self, index: usize, weight: u8) -> Self {
        self.weights[index] = weight;
        self
    }

    /// Whether the signer starts on the allowlist.
    pub fn member(mut self, member: bool) -> Self {
        self.member = member;
        self
    }

    pub fn build(self) -> LocalDeployment {
        let signer = Arc::new(KeypairSigner::generate());
        let ledger = Arc::new(MemoryLedger::new(self.network));
        ledger.publish_package(TEST_PACKAGE);
        let members = if self.member { vec![signer.address()] } else { vec![] };
        ledger.create_allowlist(TEST_NAMESPACE, members);

        let mut servers = Vec::new();
        let mut quorum_members = Vec::new();
        for (i, (behavior, weight)) in self.behaviors.iter().zip(&self.weights).enumerate() {
            let secret = X25519StaticSecret::generate();
            let public = KeyServerPublic::new(secret.public_key(), *weight);
            let server: Arc<dyn KeyServer> = match behavior {
                ServerBehavior::Honest => {
                    let local = Arc::new(LocalKeyServer::new(secret, ledger.clone()));
                    servers.push(local.clone());
                    local
                }
                ServerBehavior::Unreachable => Arc::new(UnreachableKeyServer::new(public.public_key)),
                ServerBehavior::Hanging => Arc::new(HangingKeyServer),
            };
            quorum_members.push(QuorumMember {
                name: format!("ks{i}"),
                server,
                public,
            });
        }

        let quorum = KeyServerQuorum::new(quorum_members, self.threshold)
            .unwrap_or_else(|e| panic!("fixture quorum is invalid: {e}"));

        LocalDeployment {
            namespace: PolicyNamespace::new(TEST_NAMESPACE),
            ledger,
            signer,
            servers,
            store: Arc::new(MemoryBlobStore::new()),
            quorum: Arc::new(quorum),
        }
    }
}

/// A complete in-process deployment.
pub struct LocalDeployment {
    pub namespace: PolicyNamespace,
    pub ledger: Arc<MemoryLedger>,
    pub signer: Arc<KeypairSigner>,
    /// The honest key servers.
    pub servers: Vec<Arc<LocalKeyServer>>,
    pub store: Arc<MemoryBlobStore>,
    pub quorum: Arc<KeyServerQuorum>,
}

impl LocalDeployment {
    /// `servers` honest key servers, `threshold` of them needed, signer allowed.
    pub fn new(servers: usize, threshold: u16) -> Self {
        DeploymentBuilder::new(servers, threshold).build()
    }

    /// Start building a deployment.
    pub fn builder(servers: usize, threshold: u16) -> DeploymentBuilder {
        DeploymentBuilder::new(servers, threshold)
    }

    /// Default gateway settings for this deployment.
    pub fn settings(&self) -> GatewaySettings {
        GatewaySettings::new(self.namespace, EntryPoint::new(TEST_PACKAGE))
    }

    /// A gateway with default settings.
    pub fn gateway(&self) -> Gateway {
        self.gateway_with(|_| {})
    }

    /// A gateway with adjusted settings.
    pub fn gateway_with(&self, adjust: impl FnOnce(&mut GatewaySettings)) -> Gateway {
        let mut settings = self.settings();
        adjust(&mut settings);
        Gateway::new(
            settings,
            Collaborators {
                signer: self.signer.clone(),
                ledger: self.ledger.clone(),
                quorum: self.quorum.clone(),
                store: self.store.clone(),
            },
        )
    }

    /// Take the signer off the allowlist.
    pub fn deny(&self) {
        self.ledger.remove_member(&TEST_NAMESPACE, &self.signer.address());
    }

    /// Put the signer back on the allowlist.
    pub fn allow(&self) {
        self.ledger.add_member(&TEST_NAMESPACE, self.signer.address());
    }

    /// A credential issued at `issued_at` (Unix ms) for `ttl`.
    pub async fn session_at(&self, issued_at: i64, ttl: Duration) -> SessionKey {
        SessionManager::new(self.signer.clone(), self.ledger.clone())
            .issue_at(&self.signer.address(), &TEST_PACKAGE, ttl, issued_at)
            .await
            .unwrap_or_else(|e| panic!("fixture credential: {e}"))
    }

    /// A capability proof for `id`.
    pub async fn proof(&self, id: &sealgate_core::ObjectIdentifier) -> CapabilityProof {
        CapabilityBuilder::new(self.ledger.clone(), EntryPoint::new(TEST_PACKAGE))
            .build(id, id.namespace())
            .await
            .unwrap_or_else(|e| panic!("fixture proof: {e}"))
    }
}

//! Key-server quorum client.
//!
//! Holds the configured key servers with their weights and collects share
//! points for one envelope. Requests run concurrently; collection stops as
//! soon as enough distinct points have arrived and stragglers are dropped.
//! The credential's remaining lifetime bounds the whole collection. Nothing
//! is retried.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use sealgate_core::{now_millis, X25519PublicKey};
use sealgate_envelope::{validate_threshold, EncryptedEnvelope, KeyServerPublic, SharePoint, WrapPurpose};
use sealgate_policy::{CapabilityProof, Network, SessionKey};

use crate::error::{FetchOutcome, KeyServerError, Result};
use crate::messages::{ErrorCode, FetchKeyRequest};
use crate::server::KeyServer;

/// One configured key server.
#[derive(Clone)]
pub struct QuorumMember {
    /// Where the server lives, for logs.
    pub name: String,
    pub server: Arc<dyn KeyServer>,
    pub public: KeyServerPublic,
}

/// How to reach and check one key server.
pub struct MemberConfig {
    pub name: String,
    pub server: Arc<dyn KeyServer>,
    /// Expected public key; when absent the server's report is trusted.
    pub public_key: Option<X25519PublicKey>,
    pub weight: u8,
}

/// The set of key servers an envelope is sealed to and opened through.
pub struct KeyServerQuorum {
    members: Vec<QuorumMember>,
    threshold: u16,
}

impl KeyServerQuorum {
    /// Build from known members, validating the threshold against their weights.
    pub fn new(members: Vec<QuorumMember>, threshold: u16) -> Result<Self> {
        let publics: Vec<_> = members.iter().map(|m| m.public.clone()).collect();
        validate_threshold(&publics, threshold)
            .map_err(|e| KeyServerError::InvalidQuorum(e.to_string()))?;
        Ok(Self { members, threshold })
    }

    /// Contact every server, learn or check its public key, then build.
    ///
    /// With `verify` set, a server whose reported key differs from the
    /// configured one, or that serves another network, is an error.
    pub async fn connect(
        configs: Vec<MemberConfig>,
        threshold: u16,
        network: Network,
        verify: bool,
    ) -> Result<Self> {
        let mut members = Vec::with_capacity(configs.len());

        for config in configs {
            let info = config.server.service_info().await?;

            if verify {
                if info.network != network {
                    return Err(KeyServerError::Verification {
                        endpoint: config.name,
                        reason: format!("serves {}, expected {}", info.network, network),
                    });
                }
                if let Some(expected) = config.public_key {
                    if expected != info.public_key {
                        return Err(KeyServerError::Verification {
                            endpoint: config.name,
                            reason: "public key does not match configuration".into(),
                        });
                    }
                }
            }

            let public_key = config.public_key.unwrap_or(info.public_key);
            let public = KeyServerPublic::new(public_key, config.weight);
            info!(name = %config.name, server = %public.id, weight = config.weight, "key server configured");

            members.push(QuorumMember {
                name: config.name,
                server: config.server,
                public,
            });
        }

        Self::new(members, threshold)
    }

    /// The configured threshold.
    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Public material of every member, in configuration order.
    pub fn servers(&self) -> Vec<KeyServerPublic> {
        self.members.iter().map(|m| m.public.clone()).collect()
    }

    /// The members.
    pub fn members(&self) -> &[QuorumMember] {
        &self.members
    }

    /// Collect at least `needed` distinct share points for `envelope`.
    ///
    /// Shares come back wrapped to the session's response key and are
    /// opened here. Any arrival order and any valid subset works.
    pub async fn fetch_shares(
        &self,
        envelope: &EncryptedEnvelope,
        proof: &CapabilityProof,
        session: &SessionKey,
        needed: u16,
    ) -> Result<Vec<SharePoint>> {
        let credential = session.credential();
        let deadline = credential.remaining_at(now_millis());

        let mut pending = FuturesUnordered::new();
        for member in &self.members {
            let shares = envelope.shares_for(&member.public.id);
            if shares.is_empty() {
                continue;
            }
            let expected: BTreeSet<u16> = shares.iter().map(|s| s.point).collect();
            let request = FetchKeyRequest {
                id: envelope.id.clone(),
                proof: proof.clone(),
                credential: credential.clone(),
                shares,
            };
            let server = member.server.clone();
            let name = member.name.clone();
            pending.push(async move {
                let result = server.fetch_key(&request).await;
                (name, expected, result)
            });
        }

        debug!(id = %envelope.id, servers = pending.len(), needed, "awaiting key shares");

        let mut points: Vec<SharePoint> = Vec::new();
        let mut seen = BTreeSet::new();
        let (mut denied, mut expired, mut failed) = (0usize, 0usize, 0usize);

        let collect = async {
            while let Some((name, expected, result)) = pending.next().await {
                let response = match result {
                    Ok(response) => response,
                    Err(e) => {
                        match e.code() {
                            ErrorCode::Denied => denied += 1,
                            ErrorCode::Expired => expired += 1,
                            _ => failed += 1,
                        }
                        warn!(server = %name, error = %e, "key server did not release shares");
                        continue;
                    }
                };

                for wrapped in response.shares {
                    if !expected.contains(&wrapped.point) {
                        warn!(server = %name, point = wrapped.point, "unexpected share point");
                        continue;
                    }
                    match wrapped.open(WrapPurpose::ToRequester, &envelope.id, session.response_secret()) {
                        Ok(point) => {
                            if seen.insert(point.x) {
                                points.push(point);
                            }
                        }
                        Err(e) => warn!(server = %name, error = %e, "released share does not open"),
                    }
                }

                if points.len() >= needed as usize {
                    break;
                }
            }
        };

        let timed_out = tokio::time::timeout(deadline, collect).await.is_err();

        if points.len() >= needed as usize {
            return Ok(points);
        }

        let outcome = if timed_out || expired > 0 {
            FetchOutcome::Expired
        } else if denied > 0 {
            FetchOutcome::Denied
        } else {
            FetchOutcome::Failed
        };

        warn!(
            id = %envelope.id,
            %outcome,
            needed,
            got = points.len(),
            denied,
            expired,
            failed,
            timed_out,
            "share collection fell short"
        );

        Err(KeyServerError::InsufficientShares {
            outcome,
            needed,
            got: points.len(),
        })
    }
}

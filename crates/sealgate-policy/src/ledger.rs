//! Ledger client: the view of on-chain state the protocol depends on.
//!
//! The gateway resolves objects through it and key servers simulate
//! capability proofs against it. Nothing is ever submitted.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sealgate_core::{Address, ObjectId};

use crate::error::{PolicyError, Result};

/// Which ledger deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
    Localnet,
}

impl Network {
    /// Lower-case network name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Localnet => "localnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "testnet" | "test" => Ok(Network::Testnet),
            "mainnet" | "main" => Ok(Network::Mainnet),
            "localnet" | "local" => Ok(Network::Localnet),
            other => Err(PolicyError::UnknownNetwork(other.to_string())),
        }
    }
}

/// A resolved reference to a shared ledger object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The object id.
    pub id: ObjectId,
    /// Version at which the object became shared.
    pub initial_shared_version: u64,
    /// Whether the call may mutate it.
    pub mutable: bool,
}

/// Result of simulating a transaction kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// Every call succeeded.
    Approved,
    /// A call aborted; the reason is for logs only.
    Rejected { reason: String },
}

impl SimulationOutcome {
    /// Whether the simulation approved.
    pub fn is_approved(&self) -> bool {
        matches!(self, SimulationOutcome::Approved)
    }
}

/// Read-only ledger access.
///
/// Passed explicitly to every component that needs it so tests can
/// substitute an in-process ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The network this client is bound to.
    fn network(&self) -> Network;

    /// Resolve an object id to a shared-object reference.
    ///
    /// Fails with `ObjectNotFound` for unknown ids.
    async fn resolve_object(&self, id: &ObjectId) -> Result<ObjectRef>;

    /// Dry-run a transaction kind with `sender` as the sender.
    ///
    /// Only transport problems are errors; aborted calls are
    /// `SimulationOutcome::Rejected`.
    async fn simulate(&self, tx_kind: &[u8], sender: &Address) -> Result<SimulationOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("Main".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("localnet".parse::<Network>().unwrap(), Network::Localnet);
        assert!("devnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_display_roundtrip() {
        for network in [Network::Testnet, Network::Mainnet, Network::Localnet] {
            assert_eq!(network.to_string().parse::<Network>().unwrap(), network);
        }
    }
}

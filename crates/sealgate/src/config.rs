//! Deployment configuration.
//!
//! One TOML file configures both modes. Every section has defaults, so an
//! empty file parses; [`Config::validate_gateway`] and
//! [`Config::validate_key_server`] reject configurations a mode cannot run
//! with.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sealgate_core::{Address, ObjectId, PolicyNamespace, X25519PublicKey, X25519StaticSecret};
use sealgate_keyserver::LocalKeyServer;
use sealgate_policy::{EntryPoint, KeypairSigner, MemoryLedger, Network};
use sealgate_store::WriteOptions;

use crate::error::{GatewayError, Result};

/// Environment variable that overrides `session.signing_key`.
pub const SIGNING_KEY_ENV: &str = "SEALGATE_SIGNING_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewaySection,
    pub policy: PolicySection,
    pub key_servers: KeyServersSection,
    pub session: SessionSection,
    pub ledger: LedgerSection,
    pub storage: StorageSection,
    pub key_server: KeyServerSection,
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub listen: String,
    pub max_upload_bytes: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Which policy governs uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Allowlist object id, hex.
    pub namespace: Option<String>,
    /// Evaluator package id, hex.
    pub package_id: Option<String>,
    pub module: String,
    pub function: String,
    pub nonce_len: usize,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            namespace: None,
            package_id: None,
            module: sealgate_policy::DEFAULT_MODULE.into(),
            function: sealgate_policy::DEFAULT_FUNCTION.into(),
            nonce_len: sealgate_core::DEFAULT_NONCE_LEN,
        }
    }
}

/// The key-server quorum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyServersSection {
    /// Comma-separated base URLs.
    pub endpoints: String,
    /// Expected X25519 public keys, one per endpoint, or empty.
    pub public_keys: Vec<String>,
    /// Weights, one per endpoint, or empty for all 1.
    pub weights: Vec<u8>,
    pub threshold: u16,
    pub verify_servers: bool,
}

impl Default for KeyServersSection {
    fn default() -> Self {
        Self {
            endpoints: String::new(),
            public_keys: Vec::new(),
            weights: Vec::new(),
            threshold: 2,
            verify_servers: true,
        }
    }
}

/// Session credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub ttl_minutes: u64,
    /// Ed25519 seed, hex.
    pub signing_key: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            signing_key: None,
        }
    }
}

impl fmt::Debug for SessionSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSection")
            .field("ttl_minutes", &self.ttl_minutes)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The in-process ledger view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// `testnet`, `mainnet` or `localnet` (short forms accepted).
    pub network: String,
    pub allowlists: Vec<AllowlistEntry>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            network: Network::default().as_str().into(),
            allowlists: Vec::new(),
        }
    }
}

/// One allowlist object and its members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// SQLite file; in-memory when absent.
    pub path: Option<PathBuf>,
    pub epochs: u32,
    pub deletable: bool,
    /// Length of one storage epoch.
    pub epoch_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: None,
            epochs: 1,
            deletable: true,
            epoch_secs: 24 * 60 * 60,
        }
    }
}

/// Key-server mode settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyServerSection {
    pub listen: String,
    /// X25519 secret, hex.
    pub secret_key: Option<String>,
}

impl Default for KeyServerSection {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:4000".into(),
            secret_key: None,
        }
    }
}

impl fmt::Debug for KeyServerSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyServerSection")
            .field("listen", &self.listen)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One key server as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub url: String,
    pub public_key: Option<X25519PublicKey>,
    pub weight: u8,
}

fn config_err(field: &str, e: impl fmt::Display) -> GatewayError {
    GatewayError::Config(format!("{field}: {e}"))
}

impl Config {
    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(SIGNING_KEY_ENV) {
            if !key.trim().is_empty() {
                self.session.signing_key = Some(key);
            }
        }
    }

    /// Check everything gateway mode needs.
    pub fn validate_gateway(&self) -> Result<()> {
        self.namespace()?;
        self.entry_point()?;
        self.signer()?;
        self.network()?;
        self.ledger()?;
        self.write_options()?;
        self.epoch_period()?;
        self.ttl()?;

        if self.gateway.max_upload_bytes == 0 {
            return Err(config_err("gateway.max_upload_bytes", "must be positive"));
        }

        let endpoints = self.endpoints()?;
        let total: u32 = endpoints.iter().map(|e| u32::from(e.weight)).sum();
        let threshold = self.key_servers.threshold;
        if threshold == 0 || u32::from(threshold) > total {
            return Err(config_err(
                "key_servers.threshold",
                format!("{threshold} is outside 1..={total}"),
            ));
        }
        Ok(())
    }

    /// Check everything key-server mode needs.
    pub fn validate_key_server(&self) -> Result<()> {
        self.key_server_secret()?;
        self.network()?;
        self.ledger()?;
        Ok(())
    }

    /// The policy namespace uploads are sealed under.
    pub fn namespace(&self) -> Result<PolicyNamespace> {
        let hex = self
            .policy
            .namespace
            .as_deref()
            .ok_or_else(|| config_err("policy.namespace", "missing"))?;
        PolicyNamespace::from_hex(hex).map_err(|e| config_err("policy.namespace", e))
    }

    /// The evaluator package.
    pub fn package_id(&self) -> Result<ObjectId> {
        let hex = self
            .policy
            .package_id
            .as_deref()
            .ok_or_else(|| config_err("policy.package_id", "missing"))?;
        ObjectId::from_hex(hex).map_err(|e| config_err("policy.package_id", e))
    }

    /// The approval entry point proofs call.
    pub fn entry_point(&self) -> Result<EntryPoint> {
        EntryPoint::from_parts(self.package_id()?, &self.policy.module, &self.policy.function)
            .map_err(|e| config_err("policy", e))
    }

    /// The configured network.
    pub fn network(&self) -> Result<Network> {
        self.ledger
            .network
            .parse::<Network>()
            .map_err(|e| config_err("ledger.network", e))
    }

    /// Credential lifetime.
    pub fn ttl(&self) -> Result<Duration> {
        match self.session.ttl_minutes {
            0 => Err(config_err("session.ttl_minutes", "must be positive")),
            minutes => Ok(Duration::from_secs(minutes.saturating_mul(60))),
        }
    }

    /// The gateway's signer.
    pub fn signer(&self) -> Result<KeypairSigner> {
        let seed = self.session.signing_key.as_deref().ok_or_else(|| {
            config_err(
                "session.signing_key",
                format!("missing (set it or {SIGNING_KEY_ENV})"),
            )
        })?;
        KeypairSigner::from_seed_hex(seed).map_err(|e| config_err("session.signing_key", e))
    }

    /// Options for blob writes.
    pub fn write_options(&self) -> Result<WriteOptions> {
        if self.storage.epochs == 0 {
            return Err(config_err("storage.epochs", "must be positive"));
        }
        Ok(WriteOptions::default()
            .epochs(self.storage.epochs)
            .deletable(self.storage.deletable))
    }

    /// How often the storage epoch advances.
    pub fn epoch_period(&self) -> Result<Duration> {
        match self.storage.epoch_secs {
            0 => Err(config_err("storage.epoch_secs", "must be positive")),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    /// Key-server endpoints with their keys and weights.
    pub fn endpoints(&self) -> Result<Vec<EndpointSpec>> {
        let urls: Vec<String> = self
            .key_servers
            .endpoints
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if urls.is_empty() {
            return Err(config_err("key_servers.endpoints", "no endpoints configured"));
        }

        let keys = &self.key_servers.public_keys;
        if !keys.is_empty() && keys.len() != urls.len() {
            return Err(config_err(
                "key_servers.public_keys",
                format!("{} keys for {} endpoints", keys.len(), urls.len()),
            ));
        }

        let weights = &self.key_servers.weights;
        if !weights.is_empty() && weights.len() != urls.len() {
            return Err(config_err(
                "key_servers.weights",
                format!("{} weights for {} endpoints", weights.len(), urls.len()),
            ));
        }

        urls.into_iter()
            .enumerate()
            .map(|(i, url)| {
                let public_key = keys
                    .get(i)
                    .map(|k| X25519PublicKey::from_hex(k))
                    .transpose()
                    .map_err(|e| config_err("key_servers.public_keys", e))?;
                let weight = weights.get(i).copied().unwrap_or(1);
                if weight == 0 {
                    return Err(config_err("key_servers.weights", format!("{url} has weight 0")));
                }
                Ok(EndpointSpec {
                    url,
                    public_key,
                    weight,
                })
            })
            .collect()
    }

    /// Build the ledger view described by `[ledger]` and `[policy]`.
    ///
    /// The evaluator package is published when configured; each allowlist
    /// is created with its members.
    pub fn ledger(&self) -> Result<MemoryLedger> {
        let ledger = MemoryLedger::new(self.network()?);

        if self.policy.package_id.is_some() {
            ledger.publish_entry_point(&self.entry_point()?);
        }

        for entry in &self.ledger.allowlists {
            let id = ObjectId::from_hex(&entry.id).map_err(|e| config_err("ledger.allowlists", e))?;
            let members = entry
                .members
                .iter()
                .map(|m| Address::from_hex(m))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| config_err("ledger.allowlists", e))?;
            ledger.create_allowlist(id, members);
        }

        Ok(ledger)
    }

    /// The key-server secret for key-server mode.
    pub fn key_server_secret(&self) -> Result<X25519StaticSecret> {
        let hex = self
            .key_server
            .secret_key
            .as_deref()
            .ok_or_else(|| config_err("key_server.secret_key", "missing"))?;
        X25519StaticSecret::from_hex(hex).map_err(|e| config_err("key_server.secret_key", e))
    }

    /// A key server evaluating proofs against this configuration's ledger.
    pub fn key_server(&self, ledger: std::sync::Arc<MemoryLedger>) -> Result<LocalKeyServer> {
        Ok(LocalKeyServer::new(self.key_server_secret()?, ledger)
            .with_entry_names(&self.policy.module, &self.policy.function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEED: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    fn gateway_toml() -> String {
        format!(
            r#"
[policy]
namespace = "0x{ns}"
package_id = "0x{pkg}"

[key_servers]
endpoints = "http://a:4000, http://b:4000 ,http://c:4000"
threshold = 2

[session]
signing_key = "{SEED}"

[ledger]
network = "test"
allowlists = [{{ id = "0x{ns}", members = [] }}]
"#,
            ns = "ab".repeat(32),
            pkg = "11".repeat(32),
        )
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.gateway.listen, "127.0.0.1:3000");
        assert_eq!(config.gateway.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.key_servers.threshold, 2);
        assert!(config.key_servers.verify_servers);
        assert_eq!(config.session.ttl_minutes, 10);
        assert_eq!(config.policy.nonce_len, 5);
        assert_eq!(config.network().unwrap(), Network::Testnet);
        assert_eq!(config.storage.epochs, 1);
        assert!(config.storage.deletable);
    }

    #[test]
    fn test_gateway_config_validates() {
        let config = Config::from_toml(&gateway_toml()).unwrap();
        config.validate_gateway().unwrap();

        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[1].url, "http://b:4000");
        assert!(endpoints.iter().all(|e| e.weight == 1 && e.public_key.is_none()));
        assert_eq!(config.ttl().unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn test_threshold_above_endpoints_rejected() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        config.key_servers.threshold = 5;
        assert!(matches!(config.validate_gateway(), Err(GatewayError::Config(_))));

        config.key_servers.threshold = 0;
        assert!(config.validate_gateway().is_err());
    }

    #[test]
    fn test_weights_raise_total() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        config.key_servers.threshold = 4;
        config.key_servers.weights = vec![2, 1, 1];
        config.validate_gateway().unwrap();

        config.key_servers.weights = vec![2, 1];
        assert!(config.validate_gateway().is_err());
    }

    #[test]
    fn test_missing_signing_key_rejected() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        config.session.signing_key = None;
        let err = config.validate_gateway().unwrap_err();
        assert!(err.to_string().contains(SIGNING_KEY_ENV));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        config.session.ttl_minutes = 0;
        assert!(config.validate_gateway().is_err());
    }

    #[test]
    fn test_bad_hex_rejected() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        config.policy.namespace = Some("0xnothex".into());
        assert!(config.validate_gateway().is_err());
    }

    #[test]
    fn test_ledger_built_from_config() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        let member = config.signer().unwrap();
        config.ledger.allowlists[0].members = vec![sealgate_policy::Signer::address(&member).to_hex()];

        let ledger = config.ledger().unwrap();
        let allowlist = config.namespace().unwrap().object_id();
        assert!(ledger.is_member(&allowlist, &sealgate_policy::Signer::address(&member)));
    }

    #[test]
    fn test_epoch_period() {
        let mut config = Config::from_toml(&gateway_toml()).unwrap();
        assert_eq!(config.epoch_period().unwrap(), Duration::from_secs(86_400));

        config.storage.epoch_secs = 0;
        assert!(matches!(config.validate_gateway(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_toml(&gateway_toml()).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains(SEED));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_key_server_mode_needs_secret() {
        let mut config = Config::default();
        assert!(config.validate_key_server().is_err());

        config.key_server.secret_key = Some("07".repeat(32));
        config.validate_key_server().unwrap();
    }

    proptest! {
        #[test]
        fn endpoint_lists_split_cleanly(hosts in prop::collection::vec("[a-z]{1,8}", 1..6)) {
            let mut config = Config::default();
            config.key_servers.endpoints = hosts
                .iter()
                .map(|h| format!(" http://{h}:4000 "))
                .collect::<Vec<_>>()
                .join(",");

            let endpoints = config.endpoints().unwrap();
            prop_assert_eq!(endpoints.len(), hosts.len());
            for (endpoint, host) in endpoints.iter().zip(&hosts) {
                prop_assert_eq!(&endpoint.url, &format!("http://{host}:4000"));
            }
        }
    }
}

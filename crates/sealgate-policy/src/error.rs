//! Error types for the policy module.

use thiserror::Error;

/// Errors raised by the ledger client, capability builder, signer and
/// session credential manager.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Entry point string is not `package::module::function`.
    #[error("malformed entry point: {0}")]
    MalformedEntryPoint(String),

    /// The ledger has no object with this id.
    #[error("object not found on ledger: {0}")]
    ObjectNotFound(String),

    /// The ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// A transaction kind could not be encoded or decoded.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The signer could not produce a signature.
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    /// The credential was requested for an address the signer does not control.
    #[error("signer controls {signer}, not {requested}")]
    AddressMismatch { signer: String, requested: String },

    /// Zero or overflowing credential lifetime.
    #[error("invalid credential ttl: {0} ms")]
    InvalidTtl(u64),

    /// Credential signature or binding is wrong.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Credential used outside its validity window.
    #[error("credential expired at {expires_at} (now {now})")]
    CredentialExpired { expires_at: i64, now: i64 },

    /// Unknown network name.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] sealgate_core::CoreError),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

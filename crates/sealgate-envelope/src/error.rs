//! Error types for the envelope module.

use thiserror::Error;

/// Errors that can occur while sealing or opening envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Threshold is zero or exceeds the total key-server weight.
    #[error("invalid threshold {threshold} for total key-server weight {total_weight}")]
    InvalidThreshold { threshold: u16, total_weight: u32 },

    /// The servers' weights add up to more share points than exist.
    #[error("total key-server weight {0} exceeds 65535 share points")]
    TooManySharePoints(u32),

    /// No key servers were supplied.
    #[error("no key servers configured")]
    NoKeyServers,

    /// A key server weight of zero.
    #[error("key server {0} has zero weight")]
    ZeroWeight(String),

    /// The same key server appears twice.
    #[error("duplicate key server {0}")]
    DuplicateKeyServer(String),

    /// Envelope bytes could not be parsed.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Envelope version not understood by this build.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Fewer distinct share points than the threshold.
    #[error("insufficient shares: need {needed}, got {got}")]
    InsufficientShares { needed: u16, got: usize },

    /// A share could not be unwrapped or is invalid.
    #[error("invalid share: {0}")]
    InvalidShare(String),

    /// Recombination or AEAD decryption failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] sealgate_core::CoreError),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, EnvelopeError>;

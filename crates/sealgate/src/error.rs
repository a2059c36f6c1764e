//! Error types for the gateway.
//!
//! Every collaborator failure is classified by the stage it happened in.
//! Only `Input` is a client error; the rest are server errors. Share
//! collection failures are deliberately opaque: the outcome is kept for
//! logs but never rendered.

use thiserror::Error;

use sealgate_keyserver::FetchOutcome;

/// Errors surfaced by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or unusable request input.
    #[error("invalid input: {0}")]
    Input(String),

    /// Threshold rejected, plaintext too large, or sealing failed.
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    /// The blob store did not accept the envelope.
    #[error("storage write failed: {0}")]
    StorageWriteFailure(String),

    /// Unknown or expired blob handle.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The blob store failed on read.
    #[error("storage read failed: {0}")]
    StorageReadFailure(String),

    /// Capability proof could not be built.
    #[error("proof construction failed: {0}")]
    ProofConstructionFailure(String),

    /// Session credential could not be issued.
    #[error("credential issuance failed: {0}")]
    CredentialIssuanceFailure(String),

    /// Too few key servers released shares.
    #[error("insufficient key shares")]
    InsufficientKeyShares { outcome: FetchOutcome },

    /// Stored bytes are not an envelope this gateway understands.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Shares recombined but the payload did not authenticate.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::Input(_))
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

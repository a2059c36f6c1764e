//! Error types for the key-server module.

use std::fmt;

use thiserror::Error;

use crate::messages::ErrorCode;

/// How a share collection that fell short ended.
///
/// Callers see one opaque failure; this is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// At least one key server's policy simulation rejected the proof.
    Denied,
    /// The credential deadline passed, or a server reported it expired.
    Expired,
    /// Servers were unreachable or answered with errors.
    Failed,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchOutcome::Denied => "denied",
            FetchOutcome::Expired => "expired",
            FetchOutcome::Failed => "failed",
        })
    }
}

/// Errors raised by key servers and the quorum client.
#[derive(Debug, Error)]
pub enum KeyServerError {
    /// A key server refused the request.
    #[error("key server refused ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },

    /// The key server could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// Message encoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A key server does not match its configuration.
    #[error("key server verification failed for {endpoint}: {reason}")]
    Verification { endpoint: String, reason: String },

    /// Quorum configuration is unusable.
    #[error("invalid quorum: {0}")]
    InvalidQuorum(String),

    /// Fewer share points arrived than needed.
    #[error("insufficient key shares ({outcome}): need {needed}, got {got}")]
    InsufficientShares {
        outcome: FetchOutcome,
        needed: u16,
        got: usize,
    },

    /// Envelope or share error.
    #[error("envelope error: {0}")]
    Envelope(#[from] sealgate_envelope::EnvelopeError),
}

impl KeyServerError {
    /// A refusal with the given code.
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        KeyServerError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// The wire code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            KeyServerError::Rejected { code, .. } => *code,
            _ => ErrorCode::Unavailable,
        }
    }
}

/// Result type for key-server operations.
pub type Result<T> = std::result::Result<T, KeyServerError>;

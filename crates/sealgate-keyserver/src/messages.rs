//! Key-server protocol message types.
//!
//! Bodies travel as CBOR (`application/cbor`) in both directions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sealgate_core::{KeyServerId, ObjectIdentifier, X25519PublicKey};
use sealgate_envelope::WrappedShare;
use sealgate_policy::{CapabilityProof, Network, SessionCredential};

use crate::error::{KeyServerError, Result};

/// Content type of every request and response body.
pub const CBOR_CONTENT_TYPE: &str = "application/cbor";

/// Path of the service-info endpoint.
pub const SERVICE_PATH: &str = "/v1/service";

/// Path of the key-release endpoint.
pub const FETCH_KEY_PATH: &str = "/v1/fetch_key";

/// What a key server says about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub server_id: KeyServerId,
    pub public_key: X25519PublicKey,
    pub network: Network,
}

/// Ask a key server to release its shares of one envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchKeyRequest {
    /// The identifier being decrypted.
    pub id: ObjectIdentifier,
    /// Unsigned policy-check transaction to simulate.
    pub proof: CapabilityProof,
    /// Who is asking, and where to wrap the answer.
    pub credential: SessionCredential,
    /// The envelope's shares addressed to this server.
    pub shares: Vec<WrappedShare>,
}

/// Shares re-wrapped to the credential's response key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchKeyResponse {
    pub shares: Vec<WrappedShare>,
}

/// Why a key server refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The policy evaluator rejected the proof.
    Denied,
    /// The credential is outside its validity window.
    Expired,
    /// Bad credential signature or address binding.
    InvalidCredential,
    /// The proof does not call the expected entry point for this identifier.
    InvalidProof,
    /// The server could not evaluate the request.
    Unavailable,
}

impl ErrorCode {
    /// HTTP status used on the wire.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::Denied => 403,
            ErrorCode::Expired => 410,
            ErrorCode::InvalidCredential => 401,
            ErrorCode::InvalidProof => 400,
            ErrorCode::Unavailable => 503,
        }
    }
}

/// Error body returned with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

/// Encode a message as CBOR.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| KeyServerError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR message.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| KeyServerError::Serialization(e.to_string()))
}

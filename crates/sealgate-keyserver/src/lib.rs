//! # SealGate Key Server
//!
//! The key-server side of threshold decryption and the client that talks
//! to a quorum of key servers.
//!
//! ## Key Types
//!
//! - [`KeyServer`] - the protocol as an async trait
//! - [`LocalKeyServer`] - in-process server holding one X25519 secret
//! - [`HttpKeyServer`] - client for a remote server; [`router`] serves one
//! - [`KeyServerQuorum`] - concurrent share collection up to a threshold
//!
//! ## Release Rule
//!
//! A key server releases its shares of an envelope only if:
//!
//! 1. the session credential is correctly signed by the key its address
//!    derives from, and is inside its validity window
//! 2. the capability proof only calls the credential's evaluator package,
//!    with the requested identifier as first argument
//! 3. simulating the proof with the credential's address as sender approves
//!
//! Released shares are re-wrapped to the credential's response key.

pub mod error;
pub mod http;
pub mod messages;
pub mod quorum;
pub mod server;

pub use error::{FetchOutcome, KeyServerError, Result};
pub use http::{router, serve, HttpKeyServer};
pub use messages::{
    ErrorCode, ErrorResponse, FetchKeyRequest, FetchKeyResponse, ServiceInfo, CBOR_CONTENT_TYPE,
};
pub use quorum::{KeyServerQuorum, MemberConfig, QuorumMember};
pub use server::{KeyServer, LocalKeyServer};

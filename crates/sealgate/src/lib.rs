//! # SealGate
//!
//! HTTP gateway for access-controlled threshold encryption.
//!
//! Uploads are sealed under a fresh identifier in the configured policy
//! namespace and stored as envelopes. Downloads succeed only when enough
//! key servers, each simulating the namespace's policy for the gateway's
//! address, release their shares.
//!
//! ## Key Types
//!
//! - [`Gateway`] - upload and download over one deployment
//! - [`EncryptionOrchestrator`] / [`DecryptionOrchestrator`] - the crypto flows
//! - [`Config`] - TOML deployment configuration
//! - [`GatewayError`] - every failure, classified by stage
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = Config::from_toml(&text)?;
//! let gateway = Arc::new(Gateway::from_config(&config).await?);
//! sealgate::http::serve(&config.gateway.listen, gateway).await?;
//! ```
//!
//! ## Design Notes
//!
//! - Signer, ledger, quorum and store are passed in, never global.
//! - Policy denial, expiry and unreachable key servers surface as one
//!   error; the download's terminal state in the logs tells them apart.
//! - Nothing is retried.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod orchestrator;

pub use config::{Config, EndpointSpec, SIGNING_KEY_ENV};
pub use error::{GatewayError, Result};
pub use gateway::{Collaborators, DownloadState, Gateway, GatewaySettings, UploadReceipt};
pub use http::{router, serve, ErrorBody, UploadResponse};
pub use orchestrator::{DecryptionOrchestrator, EncryptionOrchestrator};

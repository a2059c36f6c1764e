//! # SealGate Testkit
//!
//! Testing utilities for SealGate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: [`LocalDeployment`], a whole deployment in one process,
//!   with key servers that can be made unreachable or unresponsive
//! - **Generators**: Proptest strategies for identifiers, addresses,
//!   payloads and quorum shapes
//!
//! End-to-end scenarios live in this crate's `tests/` directory.
//!
//! ## Test Fixtures
//!
//! ```rust
//! use sealgate_testkit::LocalDeployment;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let deployment = LocalDeployment::new(3, 2);
//! let gateway = deployment.gateway();
//!
//! let receipt = gateway.upload(b"hello").await.unwrap();
//! assert_eq!(gateway.download(&receipt.blob_id).await.unwrap(), b"hello");
//! # });
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    DeploymentBuilder, HangingKeyServer, LocalDeployment, ServerBehavior, UnreachableKeyServer,
    TEST_NAMESPACE, TEST_PACKAGE,
};

//! # SealGate Policy
//!
//! Everything that ties key release to on-chain policy: the ledger client,
//! capability proofs, the signer and session credentials.
//!
//! ## Overview
//!
//! Access is decided by simulating, never submitting, a transaction that
//! calls the policy evaluator with the identifier being requested:
//!
//! 1. [`SessionManager`] issues a signed, time-boxed [`SessionCredential`]
//!    for the signer's address
//! 2. [`CapabilityBuilder`] builds the unsigned [`CapabilityProof`]
//! 3. Each key server checks both and simulates the proof on its own
//!    [`LedgerClient`] with the credential's address as sender
//!
//! Signer and ledger are explicit dependencies so every component can run
//! against [`MemoryLedger`] in tests.

pub mod capability;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod session;
pub mod signer;
pub mod transaction;

pub use capability::{CapabilityBuilder, CapabilityProof, EntryPoint, DEFAULT_FUNCTION, DEFAULT_MODULE};
pub use error::{PolicyError, Result};
pub use ledger::{LedgerClient, Network, ObjectRef, SimulationOutcome};
pub use memory::MemoryLedger;
pub use session::{SessionCredential, SessionKey, SessionManager};
pub use signer::{KeypairSigner, Signer};
pub use transaction::{Argument, CallArg, Command, TransactionKind};

//! Policy Capability Builder.
//!
//! A capability proof is an unsigned transaction kind calling the policy
//! evaluator's approval entry point with the identifier and the namespace
//! object. Key servers simulate it; if the simulation approves, the
//! requester may decrypt that identifier. It is built per request, handed to
//! the key-server quorum and discarded. It is never signed or submitted.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sealgate_core::{ObjectId, ObjectIdentifier, PolicyNamespace};

use crate::error::{PolicyError, Result};
use crate::ledger::LedgerClient;
use crate::transaction::{Argument, CallArg, Command, TransactionKind};

/// Default evaluator module.
pub const DEFAULT_MODULE: &str = "allowlist";

/// Default approval function.
pub const DEFAULT_FUNCTION: &str = "seal_approve";

/// The evaluator function a capability proof calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

fn check_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PolicyError::MalformedEntryPoint(format!(
            "invalid {} name {:?}",
            kind, name
        )))
    }
}

impl EntryPoint {
    /// The default approval entry point of `package`.
    pub fn new(package: ObjectId) -> Self {
        Self {
            package,
            module: DEFAULT_MODULE.to_string(),
            function: DEFAULT_FUNCTION.to_string(),
        }
    }

    /// Build from parts, validating the module and function names.
    pub fn from_parts(
        package: ObjectId,
        module: impl Into<String>,
        function: impl Into<String>,
    ) -> Result<Self> {
        let module = module.into();
        let function = function.into();
        check_identifier("module", &module)?;
        check_identifier("function", &function)?;
        Ok(Self {
            package,
            module,
            function,
        })
    }

    /// Whether a call targets this entry point.
    pub fn matches(&self, package: &ObjectId, module: &str, function: &str) -> bool {
        &self.package == package && self.module == module && self.function == function
    }
}

impl FromStr for EntryPoint {
    type Err = PolicyError;

    /// Parse `package::module::function`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split("::").collect();
        let [package, module, function] = parts.as_slice() else {
            return Err(PolicyError::MalformedEntryPoint(format!(
                "expected package::module::function, got {:?}",
                s
            )));
        };
        let package = ObjectId::from_hex(package)
            .map_err(|e| PolicyError::MalformedEntryPoint(format!("package id: {}", e)))?;
        Self::from_parts(package, *module, *function)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

/// Serialized transaction kind proving a requester may decrypt an identifier.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProof {
    tx_kind: Vec<u8>,
}

impl CapabilityProof {
    /// Wrap an encoded transaction kind.
    pub fn from_bytes(tx_kind: Vec<u8>) -> Self {
        Self { tx_kind }
    }

    /// Encode a transaction kind.
    pub fn from_kind(kind: &TransactionKind) -> Result<Self> {
        Ok(Self {
            tx_kind: kind.to_bytes()?,
        })
    }

    /// The transaction-kind-only bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.tx_kind
    }

    /// Decode the transaction kind.
    pub fn kind(&self) -> Result<TransactionKind> {
        TransactionKind::from_bytes(&self.tx_kind)
    }

    /// Check the proof only calls `entry`, each time with `id` as the first argument.
    ///
    /// Key servers run this before simulating, so a proof approved for one
    /// identifier or evaluator cannot unlock another.
    pub fn check_targets(&self, entry: &EntryPoint, id: &ObjectIdentifier) -> Result<()> {
        let kind = self.kind()?;
        let id_bytes = id.to_bytes();

        if kind.commands().is_empty() {
            return Err(PolicyError::InvalidTransaction("no calls".into()));
        }

        for command in kind.commands() {
            let Command::MoveCall {
                package,
                module,
                function,
                arguments,
            } = command;

            if !entry.matches(package, module, function) {
                return Err(PolicyError::InvalidTransaction(format!(
                    "call to {}::{}::{} is not {}",
                    package, module, function, entry
                )));
            }

            match arguments.first().and_then(|a| kind.input(a)) {
                Some(CallArg::Pure(bytes)) if bytes == &id_bytes => {}
                _ => {
                    return Err(PolicyError::InvalidTransaction(
                        "first argument is not the requested identifier".into(),
                    ))
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for CapabilityProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityProof({} bytes)", self.tx_kind.len())
    }
}

/// Builds capability proofs against one evaluator entry point.
pub struct CapabilityBuilder {
    ledger: Arc<dyn LedgerClient>,
    entry: EntryPoint,
}

impl CapabilityBuilder {
    /// Create a builder for `entry`.
    pub fn new(ledger: Arc<dyn LedgerClient>, entry: EntryPoint) -> Self {
        Self { ledger, entry }
    }

    /// The entry point proofs call.
    pub fn entry_point(&self) -> &EntryPoint {
        &self.entry
    }

    /// Build the proof for `id` under `namespace`.
    ///
    /// Fails if the ledger cannot resolve the namespace object.
    pub async fn build(
        &self,
        id: &ObjectIdentifier,
        namespace: &PolicyNamespace,
    ) -> Result<CapabilityProof> {
        let allowlist = self.ledger.resolve_object(&namespace.object_id()).await?;

        let kind = TransactionKind::Programmable {
            inputs: vec![CallArg::Pure(id.to_bytes()), CallArg::SharedObject(allowlist)],
            commands: vec![Command::MoveCall {
                package: self.entry.package,
                module: self.entry.module.clone(),
                function: self.entry.function.clone(),
                arguments: vec![Argument::Input(0), Argument::Input(1)],
            }],
        };

        let proof = CapabilityProof::from_kind(&kind)?;
        debug!(id = %id, entry = %self.entry, size = proof.as_bytes().len(), "built capability proof");
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::ledger::Network;

    fn package() -> ObjectId {
        ObjectId::from_bytes([0x11; 32])
    }

    fn namespace() -> PolicyNamespace {
        PolicyNamespace::new(ObjectId::from_bytes([0xab; 32]))
    }

    fn id() -> ObjectIdentifier {
        ObjectIdentifier::new(namespace(), vec![1, 2, 3, 4, 5])
    }

    fn ledger() -> Arc<MemoryLedger> {
        let ledger = MemoryLedger::new(Network::Testnet);
        ledger.publish_package(package());
        ledger.create_allowlist(namespace().object_id(), []);
        Arc::new(ledger)
    }

    #[test]
    fn test_entry_point_parse() {
        let s = format!("{}::allowlist::seal_approve", package().to_hex());
        let entry: EntryPoint = s.parse().unwrap();
        assert_eq!(entry, EntryPoint::new(package()));
        assert_eq!(entry.to_string(), s);
    }

    #[test]
    fn test_malformed_entry_points() {
        let pkg = package().to_hex();
        for bad in [
            "nonsense".to_string(),
            format!("{}::allowlist", pkg),
            format!("{}::allow list::seal_approve", pkg),
            format!("{}::allowlist::1seal", pkg),
            "0x12::allowlist::seal_approve".to_string(),
            format!("{}::a::b::c", pkg),
        ] {
            assert!(
                matches!(bad.parse::<EntryPoint>(), Err(PolicyError::MalformedEntryPoint(_))),
                "{} should not parse",
                bad
            );
        }
    }

    proptest::proptest! {
        #[test]
        fn entry_point_display_parses_back(
            pkg in proptest::prelude::any::<[u8; 32]>(),
            module in "[a-z_][a-z0-9_]{0,15}",
            function in "[a-z_][a-z0-9_]{0,15}",
        ) {
            let entry = EntryPoint::from_parts(ObjectId::from_bytes(pkg), module, function).unwrap();
            proptest::prop_assert_eq!(entry.to_string().parse::<EntryPoint>().unwrap(), entry);
        }
    }

    #[tokio::test]
    async fn test_build_proof_shape() {
        let builder = CapabilityBuilder::new(ledger(), EntryPoint::new(package()));
        let proof = builder.build(&id(), &namespace()).await.unwrap();

        let kind = proof.kind().unwrap();
        assert_eq!(kind.inputs()[0], CallArg::Pure(id().to_bytes()));
        assert!(matches!(
            kind.inputs()[1],
            CallArg::SharedObject(r) if r.id == namespace().object_id()
        ));
        assert!(proof.check_targets(builder.entry_point(), &id()).is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_namespace_fails() {
        let builder = CapabilityBuilder::new(ledger(), EntryPoint::new(package()));
        let other = PolicyNamespace::new(ObjectId::from_bytes([0xcd; 32]));
        let id = ObjectIdentifier::new(other, vec![0; 5]);

        assert!(matches!(
            builder.build(&id, &other).await,
            Err(PolicyError::ObjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_proof_bound_to_identifier_and_entry() {
        let builder = CapabilityBuilder::new(ledger(), EntryPoint::new(package()));
        let proof = builder.build(&id(), &namespace()).await.unwrap();

        let other_id = ObjectIdentifier::new(namespace(), vec![9; 5]);
        assert!(proof.check_targets(builder.entry_point(), &other_id).is_err());

        let other_entry = EntryPoint::new(ObjectId::from_bytes([0x22; 32]));
        assert!(proof.check_targets(&other_entry, &id()).is_err());
    }
}

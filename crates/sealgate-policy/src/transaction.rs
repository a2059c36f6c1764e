//! Transaction-kind model.
//!
//! A programmable transaction without gas, sender or signature: just the
//! inputs and the calls. This "transaction-kind-only" form is what gets
//! simulated; it can never be submitted on its own.

use serde::{Deserialize, Serialize};

use sealgate_core::ObjectId;

use crate::error::{PolicyError, Result};
use crate::ledger::ObjectRef;

/// An input to a programmable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    /// Pure bytes (here: a byte-vector argument).
    Pure(Vec<u8>),
    /// A shared object passed by reference.
    SharedObject(ObjectRef),
}

/// A reference to a transaction input by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    Input(u16),
}

/// One command in a programmable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Call `package::module::function(arguments...)`.
    MoveCall {
        package: ObjectId,
        module: String,
        function: String,
        arguments: Vec<Argument>,
    },
}

/// The body of a transaction without sender or gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Programmable {
        inputs: Vec<CallArg>,
        commands: Vec<Command>,
    },
}

impl TransactionKind {
    /// The transaction's inputs.
    pub fn inputs(&self) -> &[CallArg] {
        match self {
            TransactionKind::Programmable { inputs, .. } => inputs,
        }
    }

    /// The transaction's commands.
    pub fn commands(&self) -> &[Command] {
        match self {
            TransactionKind::Programmable { commands, .. } => commands,
        }
    }

    /// Look up the input an argument points at.
    pub fn input(&self, arg: &Argument) -> Option<&CallArg> {
        match arg {
            Argument::Input(i) => self.inputs().get(*i as usize),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| PolicyError::InvalidTransaction(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PolicyError::InvalidTransaction(e.to_string()))
    }
}

//! In-process ledger with an allowlist policy evaluator.
//!
//! Holds allowlist objects and evaluator packages. Simulating a capability
//! proof runs the allowlist approval rule: the identifier must start with
//! the allowlist's id bytes and the sender must be a member. Membership can
//! change at runtime and takes effect on the next simulation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use sealgate_core::{Address, ObjectId};

use crate::capability::EntryPoint;
use crate::error::{PolicyError, Result};
use crate::ledger::{LedgerClient, Network, ObjectRef, SimulationOutcome};
use crate::transaction::{CallArg, Command, TransactionKind};

/// In-memory ledger.
pub struct MemoryLedger {
    network: Network,
    offline: AtomicBool,
    inner: RwLock<MemoryLedgerInner>,
}

#[derive(Default)]
struct MemoryLedgerInner {
    version: u64,
    /// Approval functions each published package exposes.
    packages: HashMap<ObjectId, HashSet<(String, String)>>,
    allowlists: HashMap<ObjectId, Allowlist>,
}

struct Allowlist {
    shared_version: u64,
    members: BTreeSet<Address>,
}

impl MemoryLedger {
    /// Create an empty ledger on `network`.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            offline: AtomicBool::new(false),
            inner: RwLock::new(MemoryLedgerInner::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryLedgerInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryLedgerInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish an evaluator package exposing `allowlist::seal_approve`.
    pub fn publish_package(&self, package: ObjectId) {
        self.publish_entry_point(&EntryPoint::new(package));
    }

    /// Publish (or extend) a package so that `entry` runs the allowlist rule.
    pub fn publish_entry_point(&self, entry: &EntryPoint) {
        let mut inner = self.write();
        inner.version += 1;
        inner
            .packages
            .entry(entry.package)
            .or_default()
            .insert((entry.module.clone(), entry.function.clone()));
    }

    /// Create (or replace) an allowlist object.
    pub fn create_allowlist(&self, id: ObjectId, members: impl IntoIterator<Item = Address>) {
        let mut inner = self.write();
        inner.version += 1;
        let shared_version = inner.version;
        inner.allowlists.insert(
            id,
            Allowlist {
                shared_version,
                members: members.into_iter().collect(),
            },
        );
    }

    /// Add a member. Returns `false` if the allowlist does not exist.
    pub fn add_member(&self, allowlist: &ObjectId, member: Address) -> bool {
        let mut inner = self.write();
        inner.version += 1;
        match inner.allowlists.get_mut(allowlist) {
            Some(list) => {
                list.members.insert(member);
                true
            }
            None => false,
        }
    }

    /// Remove a member. Returns `false` if it was not a member.
    pub fn remove_member(&self, allowlist: &ObjectId, member: &Address) -> bool {
        let mut inner = self.write();
        inner.version += 1;
        inner
            .allowlists
            .get_mut(allowlist)
            .map(|list| list.members.remove(member))
            .unwrap_or(false)
    }

    /// Whether `member` is on `allowlist`.
    pub fn is_member(&self, allowlist: &ObjectId, member: &Address) -> bool {
        self.read()
            .allowlists
            .get(allowlist)
            .map(|list| list.members.contains(member))
            .unwrap_or(false)
    }

    /// Make every call fail as if the ledger were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PolicyError::LedgerUnavailable(format!(
                "{} ledger is offline",
                self.network
            )));
        }
        Ok(())
    }

    /// Run one `seal_approve(id, allowlist)` call.
    fn evaluate(
        inner: &MemoryLedgerInner,
        kind: &TransactionKind,
        command: &Command,
        sender: &Address,
    ) -> std::result::Result<(), String> {
        let Command::MoveCall {
            package,
            module,
            function,
            arguments,
        } = command;

        let functions = inner
            .packages
            .get(package)
            .ok_or_else(|| format!("package {} not found", package))?;
        if !functions.contains(&(module.clone(), function.clone())) {
            return Err(format!("function {}::{} not found", module, function));
        }

        let args: Vec<_> = arguments.iter().map(|a| kind.input(a)).collect();
        let (id, allowlist_ref) = match args.as_slice() {
            [Some(CallArg::Pure(id)), Some(CallArg::SharedObject(r))] => (id, r),
            _ => return Err("argument mismatch".into()),
        };

        let allowlist = inner
            .allowlists
            .get(&allowlist_ref.id)
            .ok_or_else(|| format!("allowlist {} not found", allowlist_ref.id))?;

        if !id.starts_with(allowlist_ref.id.as_bytes()) {
            return Err("identifier is not under this allowlist".into());
        }
        if !allowlist.members.contains(sender) {
            return Err(format!("{} is not on the allowlist", sender));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn resolve_object(&self, id: &ObjectId) -> Result<ObjectRef> {
        self.check_online()?;
        let inner = self.read();

        if let Some(list) = inner.allowlists.get(id) {
            return Ok(ObjectRef {
                id: *id,
                initial_shared_version: list.shared_version,
                mutable: false,
            });
        }
        if inner.packages.contains_key(id) {
            return Ok(ObjectRef {
                id: *id,
                initial_shared_version: 0,
                mutable: false,
            });
        }
        Err(PolicyError::ObjectNotFound(id.to_hex()))
    }

    async fn simulate(&self, tx_kind: &[u8], sender: &Address) -> Result<SimulationOutcome> {
        self.check_online()?;

        let kind = match TransactionKind::from_bytes(tx_kind) {
            Ok(kind) => kind,
            Err(e) => {
                return Ok(SimulationOutcome::Rejected {
                    reason: e.to_string(),
                })
            }
        };

        let inner = self.read();
        for command in kind.commands() {
            if let Err(reason) = Self::evaluate(&inner, &kind, command, sender) {
                debug!(%sender, %reason, "simulation rejected");
                return Ok(SimulationOutcome::Rejected { reason });
            }
        }

        Ok(SimulationOutcome::Approved)
    }
}

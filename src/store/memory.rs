//! In-process implementation of every storage trait. State lives behind one
//! mutex, so each trait call is atomic with respect to the others, which is
//! what gives `try_insert_lock` its compare-and-set semantics.

use super::{
    ChainHead, ChainStore, ContractInfo, ContractRegistry, FullNode, LastHeartbeat, LockRecord,
    LockStore, NodeAddress, NodeIdentity, ParameterStore, QueueEntry, QueueStore, StoreError,
    StoreFuture, SystemParameter, TxSubmitter,
};
use crate::tx::codec::tx_hash;
use futures::future;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const OP_SYSTEM_PARAMETERS: &str = "system_parameters";
pub const OP_TRY_INSERT_LOCK: &str = "try_insert_lock";
pub const OP_DELETE_LOCK: &str = "delete_lock";
pub const OP_DELETE_LOOPED: &str = "delete_looped";
pub const OP_PENDING_ENTRIES: &str = "pending_entries";
pub const OP_CHAIN_HEAD: &str = "chain_head";
pub const OP_NODE_IDENTITY: &str = "node_identity";
pub const OP_FIND_FULL_NODE: &str = "find_full_node";
pub const OP_LAST_HEARTBEAT: &str = "last_heartbeat";
pub const OP_SUBMIT: &str = "submit";

/// Transaction recorded by [`TxSubmitter::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_type: i64,
    pub wallet_id: i64,
    pub data: Vec<u8>,
    pub hash: Vec<u8>,
}

#[derive(Default)]
struct MemoryState {
    parameters: BTreeMap<String, String>,
    locks: HashMap<String, LockRecord>,
    queue: Vec<QueueEntry>,
    chain_head: ChainHead,
    identity: Option<NodeIdentity>,
    full_nodes: Vec<FullNode>,
    last_heartbeat: LastHeartbeat,
    contracts: Vec<ContractInfo>,
    submitted: Vec<SubmittedTx>,
    failing: HashSet<&'static str>,
}

impl MemoryState {
    fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.failing.contains(operation) {
            return Err(StoreError::Unavailable {
                operation,
                reason: "injected failure".to_owned(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state.lock().parameters.insert(name.into(), value.into());
    }

    pub fn remove_parameter(&self, name: &str) {
        self.state.lock().parameters.remove(name);
    }

    pub fn set_chain_head(&self, head: ChainHead) {
        self.state.lock().chain_head = head;
    }

    pub fn set_identity(&self, identity: NodeIdentity) {
        self.state.lock().identity = Some(identity);
    }

    pub fn register_full_node(&self, node: FullNode) {
        self.state.lock().full_nodes.push(node);
    }

    pub fn set_last_heartbeat(&self, timestamp: i64) {
        self.state.lock().last_heartbeat = LastHeartbeat { timestamp };
    }

    pub fn last_heartbeat_timestamp(&self) -> i64 {
        self.state.lock().last_heartbeat.timestamp
    }

    pub fn deploy_contract(&self, contract: ContractInfo) {
        self.state.lock().contracts.push(contract);
    }

    pub fn push_entry(&self, entry: QueueEntry) {
        self.state.lock().queue.push(entry);
    }

    pub fn entries(&self) -> Vec<QueueEntry> {
        self.state.lock().queue.clone()
    }

    /// Applies `update` to the queue entry with `hash`. Returns false when no
    /// such entry exists.
    pub fn update_entry(&self, hash: &[u8], update: impl FnOnce(&mut QueueEntry)) -> bool {
        let mut state = self.state.lock();
        match state.queue.iter_mut().find(|entry| entry.hash == hash) {
            Some(entry) => {
                update(entry);
                true
            }
            None => false,
        }
    }

    pub fn lock_record(&self, owner: &str) -> Option<LockRecord> {
        self.state.lock().locks.get(owner).cloned()
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state.lock().submitted.clone()
    }

    /// Makes every subsequent call of `operation` fail until cleared.
    pub fn fail_operation(&self, operation: &'static str) {
        self.state.lock().failing.insert(operation);
    }

    pub fn clear_failure(&self, operation: &'static str) {
        self.state.lock().failing.remove(operation);
    }
}

impl ParameterStore for MemoryStore {
    fn system_parameters(&self) -> StoreFuture<'_, Vec<SystemParameter>> {
        let state = self.state.lock();
        let result = state.check(OP_SYSTEM_PARAMETERS).map(|_| {
            state
                .parameters
                .iter()
                .map(|(name, value)| SystemParameter::new(name.clone(), value.clone()))
                .collect()
        });
        Box::pin(future::ready(result))
    }
}

impl LockStore for MemoryStore {
    fn try_insert_lock(
        &self,
        record: LockRecord,
        stale_before: Option<i64>,
    ) -> StoreFuture<'_, bool> {
        let mut state = self.state.lock();
        let result = state.check(OP_TRY_INSERT_LOCK).map(|_| {
            let replace = match state.locks.get(&record.owner) {
                None => true,
                Some(existing) => {
                    stale_before.is_some_and(|cutoff| existing.acquired_at < cutoff)
                }
            };
            if replace {
                state.locks.insert(record.owner.clone(), record);
            }
            replace
        });
        Box::pin(future::ready(result))
    }

    fn delete_lock<'a>(
        &'a self,
        owner: &'a str,
        acquired_at: Option<i64>,
    ) -> StoreFuture<'a, bool> {
        let mut state = self.state.lock();
        let result = state.check(OP_DELETE_LOCK).map(|_| {
            let matches = state.locks.get(owner).is_some_and(|existing| {
                acquired_at.map_or(true, |at| existing.acquired_at == at)
            });
            if matches {
                state.locks.remove(owner);
            }
            matches
        });
        Box::pin(future::ready(result))
    }
}

impl QueueStore for MemoryStore {
    fn delete_looped(&self, threshold: u32) -> StoreFuture<'_, u64> {
        let mut state = self.state.lock();
        let result = state.check(OP_DELETE_LOOPED).map(|_| {
            let before = state.queue.len();
            state.queue.retain(|entry| !entry.is_looped(threshold));
            (before - state.queue.len()) as u64
        });
        Box::pin(future::ready(result))
    }

    fn pending_entries(&self) -> StoreFuture<'_, Vec<QueueEntry>> {
        let state = self.state.lock();
        let result = state.check(OP_PENDING_ENTRIES).map(|_| {
            state
                .queue
                .iter()
                .filter(|entry| entry.is_pending())
                .cloned()
                .collect()
        });
        Box::pin(future::ready(result))
    }
}

impl ChainStore for MemoryStore {
    fn chain_head(&self) -> StoreFuture<'_, ChainHead> {
        let state = self.state.lock();
        let result = state
            .check(OP_CHAIN_HEAD)
            .map(|_| state.chain_head.clone());
        Box::pin(future::ready(result))
    }

    fn node_identity(&self) -> StoreFuture<'_, NodeIdentity> {
        let state = self.state.lock();
        let result = state.check(OP_NODE_IDENTITY).and_then(|_| {
            state.identity.clone().ok_or(StoreError::MissingRecord {
                record: "node identity",
            })
        });
        Box::pin(future::ready(result))
    }

    fn find_full_node(
        &self,
        requester: NodeAddress,
        target: NodeAddress,
    ) -> StoreFuture<'_, Option<FullNode>> {
        let state = self.state.lock();
        let result = state.check(OP_FIND_FULL_NODE).map(|_| {
            tracing::trace!(?requester, ?target, "full node lookup");
            state
                .full_nodes
                .iter()
                .find(|node| node.address == target)
                .cloned()
        });
        Box::pin(future::ready(result))
    }

    fn last_heartbeat(&self) -> StoreFuture<'_, LastHeartbeat> {
        let state = self.state.lock();
        let result = state
            .check(OP_LAST_HEARTBEAT)
            .map(|_| state.last_heartbeat);
        Box::pin(future::ready(result))
    }
}

impl ContractRegistry for MemoryStore {
    fn contract(&self, name: &str, state_id: i64) -> Option<ContractInfo> {
        self.state
            .lock()
            .contracts
            .iter()
            .find(|contract| contract.name == name && contract.state_id == state_id)
            .cloned()
    }
}

impl TxSubmitter for MemoryStore {
    fn submit<'a>(
        &'a self,
        tx_type: i64,
        wallet_id: i64,
        data: &'a [u8],
    ) -> StoreFuture<'a, Vec<u8>> {
        let mut state = self.state.lock();
        let result = state.check(OP_SUBMIT).map(|_| {
            let hash = tx_hash(data);
            state.submitted.push(SubmittedTx {
                tx_type,
                wallet_id,
                data: data.to_vec(),
                hash: hash.clone(),
            });
            hash
        });
        Box::pin(future::ready(result))
    }
}

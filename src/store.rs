//! Storage boundary consumed by the daemons. Every persistent read or write
//! goes through one of the traits below so the engine behind them (SQL,
//! key-value, in-memory) stays swappable. [`MemoryStore`] implements all of
//! them for embedding and tests.

pub mod memory;

pub use memory::MemoryStore;

use futures::future::BoxFuture;

/// Entries that failed more often than this without being verified or used are
/// considered looped and get evicted from the queue.
pub const LOOPED_COUNTER_THRESHOLD: u32 = 10;

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },
    #[error("storage query {operation} failed: {reason}")]
    Query {
        operation: &'static str,
        reason: String,
    },
    #[error("required record {record} is missing")]
    MissingRecord { record: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemParameter {
    pub name: String,
    pub value: String,
}

impl SystemParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Marks a named unit of work as running. `acquired_at` is unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub owner: String,
    pub acquired_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub hash: Vec<u8>,
    pub data: Vec<u8>,
    pub verified: bool,
    pub used: bool,
    pub counter: u32,
}

impl QueueEntry {
    pub fn new(hash: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            hash: hash.into(),
            data: data.into(),
            verified: false,
            used: false,
            counter: 0,
        }
    }

    /// Still waiting for the verification engine.
    pub fn is_pending(&self) -> bool {
        !self.verified && !self.used
    }

    /// Failed more than `threshold` times without ever being verified or used.
    pub fn is_looped(&self, threshold: u32) -> bool {
        self.is_pending() && self.counter > threshold
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainHead {
    pub block_id: i64,
    pub hash: Vec<u8>,
    pub time: i64,
}

impl ChainHead {
    /// A zero block id means no block has been applied yet.
    pub fn is_initialized(&self) -> bool {
        self.block_id != 0
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub state_id: i64,
    pub wallet_id: i64,
    pub private_key: Vec<u8>,
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("state_id", &self.state_id)
            .field("wallet_id", &self.wallet_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Account address scoped by its governing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub state_id: i64,
    pub wallet_id: i64,
}

impl NodeAddress {
    pub fn new(state_id: i64, wallet_id: i64) -> Self {
        Self {
            state_id,
            wallet_id,
        }
    }
}

impl From<&NodeIdentity> for NodeAddress {
    fn from(identity: &NodeIdentity) -> Self {
        Self::new(identity.state_id, identity.wallet_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullNode {
    pub id: i64,
    pub address: NodeAddress,
    pub host: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastHeartbeat {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInfo {
    pub id: i64,
    pub name: String,
    pub state_id: i64,
}

pub trait ParameterStore: Send + Sync {
    /// Returns every stored system parameter.
    fn system_parameters(&self) -> StoreFuture<'_, Vec<SystemParameter>>;
}

pub trait LockStore: Send + Sync {
    /// Inserts `record` unless a record for the same owner exists. An existing
    /// record acquired strictly before `stale_before` is replaced. Returns
    /// whether the caller now holds the lock.
    fn try_insert_lock(
        &self,
        record: LockRecord,
        stale_before: Option<i64>,
    ) -> StoreFuture<'_, bool>;

    /// Deletes the record for `owner`. When `acquired_at` is given, only a
    /// record acquired at that instant is removed, so a holder whose record
    /// was taken over cannot delete its successor's. Returns whether a record
    /// was removed.
    fn delete_lock<'a>(
        &'a self,
        owner: &'a str,
        acquired_at: Option<i64>,
    ) -> StoreFuture<'a, bool>;
}

pub trait QueueStore: Send + Sync {
    /// Deletes every looped entry and returns how many were removed.
    fn delete_looped(&self, threshold: u32) -> StoreFuture<'_, u64>;

    /// Pending entries in the order the store defines for application.
    fn pending_entries(&self) -> StoreFuture<'_, Vec<QueueEntry>>;
}

pub trait ChainStore: Send + Sync {
    fn chain_head(&self) -> StoreFuture<'_, ChainHead>;

    fn node_identity(&self) -> StoreFuture<'_, NodeIdentity>;

    /// Looks up `target` in the full-node registry on behalf of `requester`.
    fn find_full_node(
        &self,
        requester: NodeAddress,
        target: NodeAddress,
    ) -> StoreFuture<'_, Option<FullNode>>;

    fn last_heartbeat(&self) -> StoreFuture<'_, LastHeartbeat>;
}

/// Deployed contracts, resolved by name at a state version.
pub trait ContractRegistry: Send + Sync {
    fn contract(&self, name: &str, state_id: i64) -> Option<ContractInfo>;
}

/// Hands a serialized transaction to the network propagation path and returns
/// the hash the path recorded it under.
pub trait TxSubmitter: Send + Sync {
    fn submit<'a>(
        &'a self,
        tx_type: i64,
        wallet_id: i64,
        data: &'a [u8],
    ) -> StoreFuture<'a, Vec<u8>>;
}

//! Periodic node daemons and the contracts they share.
//!
//! Each daemon runs one cycle per scheduler tick. A cycle either reports a
//! [`CycleOutcome`] (including the benign skips: lock busy, chain not ready,
//! node ineligible, rate limited) or fails with a [`DaemonError`] that the
//! scheduler logs before waiting for the next tick. Nothing is retried inside
//! a cycle.

pub mod heartbeat;
pub mod param_refresh;
pub mod queue_parser;

pub use heartbeat::{HeartbeatBuilder, HEARTBEAT_CONTRACT, HEARTBEAT_LOCK};
pub use param_refresh::{ParameterRefresher, PARAM_REFRESH_NAME};
pub use queue_parser::{QueueParser, QUEUE_PARSER_LOCK};

use crate::lock::{ExecutionLock, LockError};
use crate::params::ParameterCache;
use crate::runtime::clock::{Clock, SystemClock};
use crate::runtime::telemetry::Telemetry;
use crate::store::{
    ChainStore, ContractRegistry, MemoryStore, QueueStore, StoreError, TxSubmitter,
};
use crate::tx::{CodecError, CryptoError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type DaemonFuture<'a> = BoxFuture<'a, Result<CycleReport, DaemonError>>;
pub type ApplyFuture<'a> = BoxFuture<'a, anyhow::Result<()>>;

/// Transaction verification and application engine.
///
/// Both the queue drain and the heartbeat builder go through this single
/// entry point, so a locally originated transaction takes exactly the state
/// transition a peer receiving it would take. Implementations must be
/// idempotent for a given hash and are responsible for bumping the queue
/// entry counter when an attempt fails.
pub trait TxApplier: Send + Sync {
    fn apply<'a>(&'a self, hash: &'a [u8], data: &'a [u8]) -> ApplyFuture<'a>;
}

/// A periodic unit of work driven by the scheduler.
pub trait Daemon: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn run_cycle<'a>(&'a self, token: &'a CancellationToken) -> DaemonFuture<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// Another run holds the daemon's lock.
    LockBusy,
    /// No block has been applied yet.
    ChainNotReady,
    /// This node is not a registered full node.
    Ineligible,
    /// The last heartbeat is too recent.
    RateLimited,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::LockBusy => "lock_busy",
            CycleOutcome::ChainNotReady => "chain_not_ready",
            CycleOutcome::Ineligible => "ineligible",
            CycleOutcome::RateLimited => "rate_limited",
        }
    }
}

/// Result of one successful cycle. `next_delay` overrides the scheduler
/// interval before the next cycle of the same daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub next_delay: Option<Duration>,
}

impl CycleReport {
    pub fn new(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            next_delay: None,
        }
    }

    pub fn with_next_delay(mut self, delay: Duration) -> Self {
        self.next_delay = Some(delay);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("contract {name} is not deployed")]
    MissingContract { name: &'static str },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("daemon {daemon} stopped mid-cycle by shutdown")]
    Cancelled { daemon: &'static str },
    #[error("failed to apply transaction {hash}: {source}")]
    Apply {
        hash: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DaemonError {
    /// True when the error only reflects shutdown in progress.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            DaemonError::Lock(LockError::Cancelled { .. }) | DaemonError::Cancelled { .. }
        )
    }
}

/// Fails with [`DaemonError::Cancelled`] once `token` is cancelled. Called
/// before each storage write so shutdown stops a cycle between steps.
pub(crate) fn ensure_running(
    token: &CancellationToken,
    daemon: &'static str,
) -> Result<(), DaemonError> {
    if token.is_cancelled() {
        tracing::debug!(daemon, "shutdown requested; ending cycle early");
        return Err(DaemonError::Cancelled { daemon });
    }
    Ok(())
}

/// Shared collaborators injected into every daemon.
#[derive(Clone)]
pub struct NodeServices {
    pub params: Arc<ParameterCache>,
    pub lock: ExecutionLock,
    pub chain: Arc<dyn ChainStore>,
    pub queue: Arc<dyn QueueStore>,
    pub contracts: Arc<dyn ContractRegistry>,
    pub submitter: Arc<dyn TxSubmitter>,
    pub applier: Arc<dyn TxApplier>,
    pub clock: Arc<dyn Clock>,
    pub telemetry: Arc<Telemetry>,
}

impl NodeServices {
    /// Wires every storage-side collaborator to one [`MemoryStore`].
    pub fn in_memory(store: Arc<MemoryStore>, applier: Arc<dyn TxApplier>) -> Self {
        Self::in_memory_with_clock(store, applier, Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(
        store: Arc<MemoryStore>,
        applier: Arc<dyn TxApplier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            params: Arc::new(ParameterCache::new(store.clone())),
            lock: ExecutionLock::new(store.clone()).with_clock(clock.clone()),
            chain: store.clone(),
            queue: store.clone(),
            contracts: store.clone(),
            submitter: store,
            applier,
            clock,
            telemetry: Arc::new(Telemetry::default()),
        }
    }
}

/// The one apply path used for queued and locally originated transactions.
pub(crate) async fn apply_transaction(
    applier: &dyn TxApplier,
    telemetry: &Telemetry,
    hash: &[u8],
    data: &[u8],
) -> Result<(), DaemonError> {
    applier
        .apply(hash, data)
        .await
        .map_err(|source| DaemonError::Apply {
            hash: hex::encode(hash),
            source,
        })?;
    telemetry.record_applied(1);
    Ok(())
}

//! Drains the transaction queue.
//!
//! Each cycle evicts looped entries (never verified, never used, failed more
//! than the threshold) and then feeds every pending entry, in store order, to
//! the [`TxApplier`]. The first failure ends the cycle; the failing entry is
//! retried on the next tick once the engine has bumped its counter. Shutdown
//! is honoured before eviction and between entries; the entry being applied
//! when it arrives is finished first.

use super::{
    apply_transaction, ensure_running, CycleOutcome, CycleReport, Daemon, DaemonError,
    DaemonFuture, NodeServices, TxApplier,
};
use crate::lock::ExecutionLock;
use crate::runtime::telemetry::Telemetry;
use crate::store::{ChainStore, QueueStore, LOOPED_COUNTER_THRESHOLD};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const QUEUE_PARSER_LOCK: &str = "QueueParserTx";

pub struct QueueParser {
    lock: ExecutionLock,
    chain: Arc<dyn ChainStore>,
    queue: Arc<dyn QueueStore>,
    applier: Arc<dyn TxApplier>,
    telemetry: Arc<Telemetry>,
    looped_threshold: u32,
}

impl QueueParser {
    pub fn new(services: &NodeServices) -> Self {
        Self {
            lock: services.lock.clone(),
            chain: services.chain.clone(),
            queue: services.queue.clone(),
            applier: services.applier.clone(),
            telemetry: services.telemetry.clone(),
            looped_threshold: LOOPED_COUNTER_THRESHOLD,
        }
    }

    pub fn with_looped_threshold(mut self, threshold: u32) -> Self {
        self.looped_threshold = threshold;
        self
    }

    pub async fn run(&self, token: &CancellationToken) -> Result<CycleReport, DaemonError> {
        let Some(guard) = self.lock.acquire(token, QUEUE_PARSER_LOCK).await? else {
            return Ok(CycleReport::new(CycleOutcome::LockBusy));
        };

        let result = self.parse_queue(token).await;
        // Release failures are logged by the guard and do not undo applied work.
        let _ = guard.release().await;
        result
    }

    async fn parse_queue(&self, token: &CancellationToken) -> Result<CycleReport, DaemonError> {
        let head = self.chain.chain_head().await?;
        if !head.is_initialized() {
            tracing::debug!(daemon = QUEUE_PARSER_LOCK, "no blocks applied yet; nothing to parse");
            return Ok(CycleReport::new(CycleOutcome::ChainNotReady));
        }

        ensure_running(token, QUEUE_PARSER_LOCK)?;
        let evicted = self.queue.delete_looped(self.looped_threshold).await?;
        self.telemetry.record_evicted(evicted);
        if evicted > 0 {
            tracing::info!(
                daemon = QUEUE_PARSER_LOCK,
                evicted,
                threshold = self.looped_threshold,
                "evicted looped transactions"
            );
        }

        let pending = self.queue.pending_entries().await?;
        let total = pending.len();
        for (index, entry) in pending.iter().enumerate() {
            ensure_running(token, QUEUE_PARSER_LOCK)?;
            if let Err(err) = apply_transaction(
                self.applier.as_ref(),
                &self.telemetry,
                &entry.hash,
                &entry.data,
            )
            .await
            {
                tracing::warn!(
                    daemon = QUEUE_PARSER_LOCK,
                    applied = index,
                    remaining = total - index,
                    counter = entry.counter,
                    error = %err,
                    "queue parsing stopped at failing transaction"
                );
                return Err(err);
            }
        }

        tracing::debug!(daemon = QUEUE_PARSER_LOCK, applied = total, "queue drained");
        Ok(CycleReport::new(CycleOutcome::Completed))
    }
}

impl Daemon for QueueParser {
    fn name(&self) -> &'static str {
        QUEUE_PARSER_LOCK
    }

    fn run_cycle<'a>(&'a self, token: &'a CancellationToken) -> DaemonFuture<'a> {
        Box::pin(self.run(token))
    }
}

//! Full-node heartbeat.
//!
//! A registered full node periodically emits a signed `@0UpdFullNodes`
//! transaction to show it is still validating. Emission is rate limited by the
//! `upd_full_nodes_period` system parameter. The transaction is submitted to
//! the network and then applied locally through the same path as queued
//! transactions.

use super::{
    apply_transaction, ensure_running, CycleOutcome, CycleReport, Daemon, DaemonError,
    DaemonFuture, NodeServices, TxApplier,
};
use crate::lock::ExecutionLock;
use crate::params::ParameterCache;
use crate::runtime::clock::Clock;
use crate::runtime::telemetry::Telemetry;
use crate::store::{ChainStore, ContractRegistry, NodeAddress, NodeIdentity, TxSubmitter};
use crate::tx::codec::{encode_heartbeat, encode_length_plus_data, tx_hash};
use crate::tx::{NodeSigner, SmartContractTx, TxHeader};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const HEARTBEAT_LOCK: &str = "UpdFullNodes";
pub const HEARTBEAT_CONTRACT: &str = "@0UpdFullNodes";
/// State version the heartbeat contract is resolved at.
pub const HEARTBEAT_CONTRACT_STATE: i64 = 0;

pub const DEFAULT_HEARTBEAT_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_INELIGIBLE_DELAY: Duration = Duration::from_secs(10);

pub struct HeartbeatBuilder {
    lock: ExecutionLock,
    chain: Arc<dyn ChainStore>,
    contracts: Arc<dyn ContractRegistry>,
    submitter: Arc<dyn TxSubmitter>,
    applier: Arc<dyn TxApplier>,
    params: Arc<ParameterCache>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<Telemetry>,
    steady_delay: Duration,
    ineligible_delay: Duration,
}

impl HeartbeatBuilder {
    pub fn new(services: &NodeServices) -> Self {
        Self {
            lock: services.lock.clone(),
            chain: services.chain.clone(),
            contracts: services.contracts.clone(),
            submitter: services.submitter.clone(),
            applier: services.applier.clone(),
            params: services.params.clone(),
            clock: services.clock.clone(),
            telemetry: services.telemetry.clone(),
            steady_delay: DEFAULT_HEARTBEAT_DELAY,
            ineligible_delay: DEFAULT_INELIGIBLE_DELAY,
        }
    }

    /// Overrides the delay before the next cycle for registered nodes
    /// (`steady`) and for nodes missing from the registry (`ineligible`).
    pub fn with_delays(mut self, steady: Duration, ineligible: Duration) -> Self {
        self.steady_delay = steady;
        self.ineligible_delay = ineligible;
        self
    }

    pub async fn run(&self, token: &CancellationToken) -> Result<CycleReport, DaemonError> {
        let Some(guard) = self.lock.acquire(token, HEARTBEAT_LOCK).await? else {
            return Ok(self.steady(CycleOutcome::LockBusy));
        };

        let result = self.emit(token).await;
        let _ = guard.release().await;
        result
    }

    fn steady(&self, outcome: CycleOutcome) -> CycleReport {
        CycleReport::new(outcome).with_next_delay(self.steady_delay)
    }

    async fn emit(&self, token: &CancellationToken) -> Result<CycleReport, DaemonError> {
        let head = self.chain.chain_head().await?;
        if !head.is_initialized() {
            tracing::debug!(daemon = HEARTBEAT_LOCK, "no blocks applied yet; heartbeat skipped");
            return Ok(self.steady(CycleOutcome::ChainNotReady));
        }

        let identity = self.chain.node_identity().await?;
        let address = NodeAddress::from(&identity);
        let Some(full_node) = self.chain.find_full_node(address, address).await? else {
            tracing::debug!(
                daemon = HEARTBEAT_LOCK,
                state_id = address.state_id,
                wallet_id = address.wallet_id,
                "node is not a registered full node"
            );
            return Ok(CycleReport::new(CycleOutcome::Ineligible)
                .with_next_delay(self.ineligible_delay));
        };

        let now = self.clock.now_unix();
        let last = self.chain.last_heartbeat().await?;
        let period = self.params.upd_full_nodes_period();
        let elapsed = now.saturating_sub(last.timestamp);
        if elapsed <= period {
            tracing::debug!(
                daemon = HEARTBEAT_LOCK,
                elapsed,
                period,
                "previous heartbeat is too recent"
            );
            return Ok(self.steady(CycleOutcome::RateLimited));
        }

        let Some(contract) = self
            .contracts
            .contract(HEARTBEAT_CONTRACT, HEARTBEAT_CONTRACT_STATE)
        else {
            tracing::error!(
                daemon = HEARTBEAT_LOCK,
                contract = HEARTBEAT_CONTRACT,
                "heartbeat contract is not deployed; check the node's genesis configuration"
            );
            return Err(DaemonError::MissingContract {
                name: HEARTBEAT_CONTRACT,
            });
        };

        let data = build_heartbeat(&identity, contract.id, now)?;
        ensure_running(token, HEARTBEAT_LOCK)?;
        self.submitter
            .submit(contract.id, identity.wallet_id, &data)
            .await?;
        let hash = tx_hash(&data);

        apply_transaction(self.applier.as_ref(), &self.telemetry, &hash, &data).await?;
        self.telemetry.record_heartbeat();

        tracing::info!(
            daemon = HEARTBEAT_LOCK,
            full_node_id = full_node.id,
            wallet_id = identity.wallet_id,
            hash = %hex::encode(&hash),
            "full node heartbeat submitted"
        );
        Ok(self.steady(CycleOutcome::Completed))
    }
}

/// Builds the wire bytes of a heartbeat sent by `identity` at `time`.
///
/// The header is signed with `state_id` 0 and no signatures, then re-emitted
/// with the length-prefixed signature and an empty body.
pub fn build_heartbeat(
    identity: &NodeIdentity,
    tx_type: i64,
    time: i64,
) -> Result<Vec<u8>, DaemonError> {
    let signer = NodeSigner::from_private_key(&identity.private_key)?;
    let header = TxHeader::new(tx_type, time, identity.wallet_id, 0);
    let signature = signer.sign(header.for_sign().as_bytes());

    let tx = SmartContractTx {
        header: header.with_signatures(encode_length_plus_data(&signature)),
        data: Vec::new(),
    };
    Ok(encode_heartbeat(&tx)?)
}

impl Daemon for HeartbeatBuilder {
    fn name(&self) -> &'static str {
        HEARTBEAT_LOCK
    }

    fn run_cycle<'a>(&'a self, token: &'a CancellationToken) -> DaemonFuture<'a> {
        Box::pin(self.run(token))
    }
}

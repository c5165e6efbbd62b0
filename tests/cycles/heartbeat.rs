use std::time::Duration;

use crate::support::helpers::{
    init_tracing, node_address, node_identity, registered_store, Harness, RecordingApplier,
    HEARTBEAT_TX_TYPE, NODE_WALLET, NOW,
};
use anyhow::Result;
use node_daemons::{
    daemons::{HEARTBEAT_CONTRACT, HEARTBEAT_LOCK},
    params::keys,
    store::{ChainHead, FullNode, MemoryStore, NodeIdentity},
    tx::codec::{decode_heartbeat, decode_length_plus_data, tx_hash, HEARTBEAT_TX_MARKER},
    tx::signing::verify_signature,
    tx::{NodeSigner, TxHeader},
    Clock, CycleOutcome, DaemonError, HeartbeatBuilder, NodeServices,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn recent_heartbeat_rate_limits_the_cycle() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.set_parameter(keys::UPD_FULL_NODES_PERIOD, "3600");
    harness.services.params.refresh().await?;
    harness.store.set_last_heartbeat(NOW - 1000);

    let builder = HeartbeatBuilder::new(&harness.services);
    let token = CancellationToken::new();
    let report = builder.run(&token).await?;

    assert_eq!(report.outcome, CycleOutcome::RateLimited);
    assert_eq!(report.next_delay, Some(Duration::from_secs(60)));
    assert!(harness.store.submitted().is_empty());
    assert!(harness.applier.attempts().is_empty());

    harness.store.set_last_heartbeat(NOW - 4000);
    let report = builder.run(&token).await?;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(harness.store.submitted().len(), 1);
    assert_eq!(harness.services.telemetry.snapshot().heartbeats_emitted, 1);
    Ok(())
}

#[tokio::test]
async fn period_boundary_is_still_rate_limited() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.services.params.refresh().await?;
    harness.store.set_last_heartbeat(NOW - 3600);

    let builder = HeartbeatBuilder::new(&harness.services);
    let token = CancellationToken::new();
    assert_eq!(
        builder.run(&token).await?.outcome,
        CycleOutcome::RateLimited
    );

    harness.clock.advance(1);
    assert_eq!(builder.run(&token).await?.outcome, CycleOutcome::Completed);
    Ok(())
}

#[tokio::test]
async fn unregistered_node_backs_off_without_signing() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.set_chain_head(ChainHead {
        block_id: 1,
        hash: vec![1; 32],
        time: NOW,
    });
    // A key that cannot be parsed proves no signature is attempted.
    store.set_identity(NodeIdentity {
        private_key: vec![0xff; 5],
        ..node_identity()
    });
    let harness = Harness::new(store);

    let builder = HeartbeatBuilder::new(&harness.services);
    let report = builder.run(&CancellationToken::new()).await?;

    assert_eq!(report.outcome, CycleOutcome::Ineligible);
    assert_eq!(report.next_delay, Some(Duration::from_secs(10)));
    assert!(harness.store.submitted().is_empty());
    assert!(harness.store.lock_record(HEARTBEAT_LOCK).is_none());
    Ok(())
}

#[tokio::test]
async fn missing_contract_is_reported() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.set_chain_head(ChainHead {
        block_id: 5,
        ..ChainHead::default()
    });
    store.set_identity(node_identity());
    store.register_full_node(FullNode {
        id: 8,
        address: node_address(),
        host: "10.0.0.8:7078".to_owned(),
    });
    let harness = Harness::new(store);

    let builder = HeartbeatBuilder::new(&harness.services);
    let err = builder
        .run(&CancellationToken::new())
        .await
        .expect_err("undeployed contract should fail the cycle");

    assert!(matches!(
        err,
        DaemonError::MissingContract {
            name: HEARTBEAT_CONTRACT
        }
    ));
    assert!(harness.store.submitted().is_empty());
    assert!(harness.store.lock_record(HEARTBEAT_LOCK).is_none());
    Ok(())
}

#[tokio::test]
async fn submitted_heartbeat_is_applied_locally() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());

    let builder = HeartbeatBuilder::new(&harness.services);
    let report = builder.run(&CancellationToken::new()).await?;
    assert_eq!(report.outcome, CycleOutcome::Completed);

    let submitted = harness.store.submitted();
    assert_eq!(submitted.len(), 1);
    let tx = &submitted[0];
    assert_eq!(tx.tx_type, HEARTBEAT_TX_TYPE);
    assert_eq!(tx.wallet_id, NODE_WALLET);
    assert_eq!(tx.data[0], HEARTBEAT_TX_MARKER);

    let applied = harness.applier.applied();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].data, tx.data);
    assert_eq!(applied[0].hash, tx_hash(&tx.data));
    assert_eq!(applied[0].hash, tx.hash);

    let decoded = decode_heartbeat(&tx.data)?;
    assert_eq!(decoded.header.tx_type, HEARTBEAT_TX_TYPE);
    assert_eq!(decoded.header.time, NOW);
    assert_eq!(decoded.header.wallet_id, NODE_WALLET);

    let (signature, _) = decode_length_plus_data(&decoded.header.signatures)?;
    let signer = NodeSigner::from_private_key(&node_identity().private_key)?;
    let unsigned = TxHeader::new(HEARTBEAT_TX_TYPE, NOW, NODE_WALLET, 0);
    verify_signature(
        &signer.verifying_key(),
        unsigned.for_sign().as_bytes(),
        signature,
    )?;

    assert!(harness.store.lock_record(HEARTBEAT_LOCK).is_none());
    Ok(())
}

#[tokio::test]
async fn empty_chain_skips_the_heartbeat() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.set_chain_head(ChainHead::default());

    let builder = HeartbeatBuilder::new(&harness.services)
        .with_delays(Duration::from_secs(30), Duration::from_secs(5));
    let report = builder.run(&CancellationToken::new()).await?;

    assert_eq!(report.outcome, CycleOutcome::ChainNotReady);
    assert_eq!(report.next_delay, Some(Duration::from_secs(30)));
    assert!(harness.store.submitted().is_empty());
    Ok(())
}

/// Reports a fixed time and requests shutdown every time it is read, which
/// lands the cancellation after the lock is taken.
struct ShutdownClock {
    token: CancellationToken,
}

impl Clock for ShutdownClock {
    fn now_unix(&self) -> i64 {
        self.token.cancel();
        NOW
    }
}

#[tokio::test]
async fn shutdown_before_submit_emits_nothing() -> Result<()> {
    init_tracing();
    let store = registered_store();
    let applier = Arc::new(RecordingApplier::new(store.clone()));
    let token = CancellationToken::new();
    let clock = Arc::new(ShutdownClock {
        token: token.clone(),
    });
    let services = NodeServices::in_memory_with_clock(store.clone(), applier.clone(), clock);

    let builder = HeartbeatBuilder::new(&services);
    let err = builder
        .run(&token)
        .await
        .expect_err("shutdown should end the cycle before submission");

    assert!(matches!(
        err,
        DaemonError::Cancelled {
            daemon: HEARTBEAT_LOCK
        }
    ));
    assert!(store.submitted().is_empty());
    assert!(applier.attempts().is_empty());
    assert!(store.lock_record(HEARTBEAT_LOCK).is_none());
    Ok(())
}

use std::time::Duration;

use crate::support::helpers::{
    entry, hash_labels, init_tracing, registered_store, wait_for, AppliedTx, RecordingApplier,
};
use anyhow::Result;
use node_daemons::{
    params::keys, tx::HEARTBEAT_TX_MARKER, DaemonConfig, NodeServices, Runner,
};
use std::sync::Arc;
use tokio::time::timeout;

fn fast_config() -> Result<DaemonConfig> {
    DaemonConfig::builder()
        .queue_parser_interval(Duration::from_millis(20))
        .heartbeat_interval(Duration::from_millis(50))
        .ineligible_backoff(Duration::from_millis(50))
        .param_refresh_interval(Duration::from_millis(20))
        .metrics_interval(Duration::from_millis(100))
        .lock_lease(Duration::from_secs(30))
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_drives_every_daemon_until_stopped() -> Result<()> {
    init_tracing();
    let store = registered_store();
    for hash in ["q1", "q2", "q3"] {
        store.push_entry(entry(hash));
    }
    store.set_parameter(keys::MAX_TX_COUNT, "250");

    let applier = Arc::new(RecordingApplier::new(store.clone()));
    let services = NodeServices::in_memory(store.clone(), applier.clone());
    let params = services.params.clone();

    let mut runner = Runner::with_services(fast_config()?, services)?;
    runner.start().await?;

    wait_for(
        || store.entries().iter().all(|entry| !entry.is_pending()),
        Duration::from_secs(5),
    )
    .await?;
    wait_for(|| store.submitted().len() == 1, Duration::from_secs(5)).await?;
    wait_for(|| params.max_tx_count() == 250, Duration::from_secs(5)).await?;

    runner.stop().await?;

    let queued: Vec<Vec<u8>> = applier
        .applied()
        .into_iter()
        .filter(|tx: &AppliedTx| tx.data.first() != Some(&HEARTBEAT_TX_MARKER))
        .map(|tx| tx.hash)
        .collect();
    assert_eq!(hash_labels(&queued), vec!["q1", "q2", "q3"]);

    let snapshot = runner.telemetry().snapshot();
    assert!(snapshot.cycles_completed >= 3);
    assert_eq!(snapshot.heartbeats_emitted, 1);
    assert!(snapshot.param_refreshes >= 1);
    assert!(!runner.is_running());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_the_token_stops_run_until_ctrl_c() -> Result<()> {
    init_tracing();
    let store = registered_store();
    let applier = Arc::new(RecordingApplier::new(store.clone()));
    let services = NodeServices::in_memory(store, applier);

    let mut runner = Runner::with_services(fast_config()?, services)?;
    let token = runner.cancellation_token();

    let handle = tokio::spawn(async move {
        runner.run_until_ctrl_c().await?;
        anyhow::Ok(runner)
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let runner = timeout(Duration::from_secs(5), handle)
        .await
        .expect("runner should stop after cancellation")??;
    assert!(!runner.is_running());
    assert!(runner.telemetry().snapshot().cycles_completed > 0);
    Ok(())
}

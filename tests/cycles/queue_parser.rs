use crate::support::helpers::{entry, hash_labels, init_tracing, registered_store, Harness};
use anyhow::Result;
use node_daemons::{
    daemons::QUEUE_PARSER_LOCK,
    store::{memory::OP_PENDING_ENTRIES, ChainHead, QueueEntry},
    CycleOutcome, DaemonError, QueueParser,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn looped_entries_are_evicted_before_parsing() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.push_entry(QueueEntry {
        counter: 11,
        ..entry("looped")
    });
    harness.store.push_entry(QueueEntry {
        counter: 10,
        ..entry("at-threshold")
    });
    harness.store.push_entry(QueueEntry {
        verified: true,
        counter: 50,
        ..entry("verified")
    });

    let parser = QueueParser::new(&harness.services);
    let report = parser.run(&CancellationToken::new()).await?;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(
        hash_labels(&harness.applier.attempts()),
        vec!["at-threshold"],
        "only the pending survivor is handed to the applier"
    );

    let remaining: Vec<Vec<u8>> = harness
        .store
        .entries()
        .into_iter()
        .map(|entry| entry.hash)
        .collect();
    assert_eq!(hash_labels(&remaining), vec!["at-threshold", "verified"]);
    assert_eq!(harness.services.telemetry.snapshot().looped_evicted, 1);
    Ok(())
}

#[tokio::test]
async fn pending_entries_are_applied_in_store_order() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    for hash in ["c", "a", "b"] {
        harness.store.push_entry(entry(hash));
    }
    harness.store.push_entry(QueueEntry {
        used: true,
        ..entry("already-used")
    });

    let parser = QueueParser::new(&harness.services);
    parser.run(&CancellationToken::new()).await?;

    assert_eq!(
        hash_labels(&harness.applier.applied_hashes()),
        vec!["c", "a", "b"]
    );
    let applied = harness.applier.applied();
    assert_eq!(applied[0].data, b"payload-c".to_vec());
    assert!(harness.store.entries().iter().all(|entry| !entry.is_pending()));
    assert_eq!(harness.services.telemetry.snapshot().entries_applied, 3);
    assert!(harness.store.lock_record(QUEUE_PARSER_LOCK).is_none());
    Ok(())
}

#[tokio::test]
async fn first_failure_ends_the_cycle() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    for hash in ["t1", "t2", "t3"] {
        harness.store.push_entry(entry(hash));
    }
    harness.applier.reject("t2");

    let parser = QueueParser::new(&harness.services);
    let err = parser
        .run(&CancellationToken::new())
        .await
        .expect_err("rejected transaction should fail the cycle");

    match &err {
        DaemonError::Apply { hash, .. } => assert_eq!(hash, &hex::encode("t2")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(hash_labels(&harness.applier.attempts()), vec!["t1", "t2"]);
    assert!(
        harness.store.lock_record(QUEUE_PARSER_LOCK).is_none(),
        "lock must be released after a failed cycle"
    );

    // The failing entry is retried on the next cycle once it is accepted.
    harness.applier.accept("t2");
    parser.run(&CancellationToken::new()).await?;
    assert_eq!(
        hash_labels(&harness.applier.applied_hashes()),
        vec!["t1", "t2", "t3"]
    );

    let t2 = harness
        .store
        .entries()
        .into_iter()
        .find(|entry| entry.hash == b"t2")
        .expect("t2 stays in the queue");
    assert_eq!(t2.counter, 1);
    Ok(())
}

#[tokio::test]
async fn repeated_failures_lead_to_eviction() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.push_entry(entry("poison"));
    harness.applier.reject("poison");

    let parser = QueueParser::new(&harness.services).with_looped_threshold(2);
    let token = CancellationToken::new();
    for _ in 0..3 {
        assert!(parser.run(&token).await.is_err());
    }

    let report = parser.run(&token).await?;
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert!(harness.store.entries().is_empty());
    assert_eq!(harness.applier.attempts().len(), 3);
    Ok(())
}

#[tokio::test]
async fn empty_chain_leaves_the_queue_untouched() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.set_chain_head(ChainHead::default());
    harness.store.push_entry(QueueEntry {
        counter: 99,
        ..entry("looped")
    });
    harness.store.push_entry(entry("pending"));

    let parser = QueueParser::new(&harness.services);
    let report = parser.run(&CancellationToken::new()).await?;

    assert_eq!(report.outcome, CycleOutcome::ChainNotReady);
    assert_eq!(harness.store.entries().len(), 2);
    assert!(harness.applier.attempts().is_empty());
    Ok(())
}

#[tokio::test]
async fn busy_lock_skips_the_cycle() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.push_entry(entry("waiting"));
    let token = CancellationToken::new();

    let guard = harness
        .services
        .lock
        .acquire(&token, QUEUE_PARSER_LOCK)
        .await?
        .expect("lock should be free");

    let parser = QueueParser::new(&harness.services);
    let report = parser.run(&token).await?;
    assert_eq!(report.outcome, CycleOutcome::LockBusy);
    assert!(harness.applier.attempts().is_empty());

    guard.release().await?;
    let report = parser.run(&token).await?;
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(hash_labels(&harness.applier.applied_hashes()), vec!["waiting"]);
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_the_drain_between_entries() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    for hash in ["s1", "s2", "s3"] {
        harness.store.push_entry(entry(hash));
    }
    let token = CancellationToken::new();
    harness.applier.cancel_on_apply(token.clone());

    let parser = QueueParser::new(&harness.services);
    let err = parser
        .run(&token)
        .await
        .expect_err("shutdown should end the cycle");

    assert!(matches!(
        err,
        DaemonError::Cancelled {
            daemon: QUEUE_PARSER_LOCK
        }
    ));
    assert!(err.is_cancellation());
    assert_eq!(
        hash_labels(&harness.applier.attempts()),
        vec!["s1"],
        "the entry in flight finishes, the rest wait for the next run"
    );
    assert_eq!(
        harness
            .store
            .entries()
            .iter()
            .filter(|entry| entry.is_pending())
            .count(),
        2
    );
    assert!(harness.store.lock_record(QUEUE_PARSER_LOCK).is_none());
    Ok(())
}

#[tokio::test]
async fn storage_failure_releases_the_lock() -> Result<()> {
    init_tracing();
    let harness = Harness::new(registered_store());
    harness.store.fail_operation(OP_PENDING_ENTRIES);

    let parser = QueueParser::new(&harness.services);
    let err = parser
        .run(&CancellationToken::new())
        .await
        .expect_err("pending read failure should surface");

    assert!(matches!(err, DaemonError::Store(_)));
    assert!(harness.store.lock_record(QUEUE_PARSER_LOCK).is_none());
    Ok(())
}

use crate::daemons::CycleOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Counters shared by the daemons and the scheduler.
#[derive(Default, Debug)]
pub struct Telemetry {
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    cycles_failed: AtomicU64,
    looped_evicted: AtomicU64,
    entries_applied: AtomicU64,
    heartbeats_emitted: AtomicU64,
    param_refreshes: AtomicU64,
}

impl Telemetry {
    /// Counts a finished cycle. Anything other than `Completed` is a skip.
    pub fn record_cycle(&self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Completed => self.cycles_completed.fetch_add(1, Ordering::Relaxed),
            _ => self.cycles_skipped.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_cycle_failure(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.looped_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_applied(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.entries_applied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_param_refresh(&self) {
        self.param_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            looped_evicted: self.looped_evicted.load(Ordering::Relaxed),
            entries_applied: self.entries_applied.load(Ordering::Relaxed),
            heartbeats_emitted: self.heartbeats_emitted.load(Ordering::Relaxed),
            param_refreshes: self.param_refreshes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub looped_evicted: u64,
    pub entries_applied: u64,
    pub heartbeats_emitted: u64,
    pub param_refreshes: u64,
}

/// Spawns a background task that periodically logs cycle, queue and heartbeat counters.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "node_daemons::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    tracing::info!(
                        target: "node_daemons::metrics",
                        cycles_completed = current.cycles_completed,
                        cycles_skipped = current.cycles_skipped,
                        cycles_failed = current.cycles_failed,
                        applied_delta = current.entries_applied.saturating_sub(last_snapshot.entries_applied),
                        evicted_delta = current.looped_evicted.saturating_sub(last_snapshot.looped_evicted),
                        heartbeats = current.heartbeats_emitted,
                        param_refreshes = current.param_refreshes,
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current;
                }
            }
        }
    })
}

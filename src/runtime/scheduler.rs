use crate::daemons::Daemon;
use crate::runtime::telemetry::Telemetry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Drives `daemon` until `shutdown` is cancelled.
///
/// The first cycle runs immediately. After each cycle the loop waits for the
/// report's `next_delay` when one is given, otherwise for `interval`. A failed
/// cycle is logged and counted; the loop always proceeds to the next tick.
pub fn spawn_daemon_loop(
    daemon: Arc<dyn Daemon>,
    interval: Duration,
    shutdown: CancellationToken,
    telemetry: Arc<Telemetry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = daemon.name();
        tracing::info!(
            daemon = name,
            interval_ms = interval.as_millis() as u64,
            "daemon started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let delay = match daemon.run_cycle(&shutdown).await {
                Ok(report) => {
                    telemetry.record_cycle(report.outcome);
                    tracing::trace!(
                        daemon = name,
                        outcome = report.outcome.as_str(),
                        "cycle finished"
                    );
                    report.next_delay.unwrap_or(interval)
                }
                Err(err) if err.is_cancellation() => {
                    tracing::debug!(daemon = name, "cycle interrupted by shutdown");
                    break;
                }
                Err(err) => {
                    telemetry.record_cycle_failure();
                    tracing::error!(daemon = name, error = %err, "daemon cycle failed");
                    interval
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        tracing::info!(daemon = name, "daemon stopped");
    })
}

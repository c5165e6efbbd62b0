use crate::daemons::{Daemon, HeartbeatBuilder, NodeServices, ParameterRefresher, QueueParser};
use crate::runtime::config::DaemonConfig;
use crate::runtime::scheduler::spawn_daemon_loop;
use crate::runtime::telemetry::{spawn_metrics_reporter, Telemetry};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Registration {
    daemon: Arc<dyn Daemon>,
    interval: Duration,
}

/// Owns the daemon loops and handles OS signals for graceful shutdowns.
pub struct Runner {
    registrations: Vec<Registration>,
    telemetry: Arc<Telemetry>,
    metrics_interval: Option<Duration>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl Runner {
    /// Creates an empty runner; daemons are added with [`Runner::register`].
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        Self {
            registrations: Vec::new(),
            telemetry,
            metrics_interval: None,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
            started: false,
        }
    }

    /// Builds a runner with the parameter refresher, queue parser and heartbeat
    /// builder registered at the configured intervals.
    pub fn with_services(config: DaemonConfig, mut services: NodeServices) -> Result<Self> {
        config.validate()?;

        if let Some(lease) = config.lock_lease() {
            services.lock = services.lock.clone().with_lease(lease);
        }

        let refresher = ParameterRefresher::new(&services);
        let queue_parser =
            QueueParser::new(&services).with_looped_threshold(config.looped_tx_threshold());
        let heartbeat = HeartbeatBuilder::new(&services)
            .with_delays(config.heartbeat_interval(), config.ineligible_backoff());

        let mut runner = Self::new(services.telemetry.clone());
        runner.metrics_interval = Some(config.metrics_interval());
        runner
            .register(Arc::new(refresher), config.param_refresh_interval())
            .register(Arc::new(queue_parser), config.queue_parser_interval())
            .register(Arc::new(heartbeat), config.heartbeat_interval());
        Ok(runner)
    }

    /// Adds a daemon driven every `interval`. Registrations made after
    /// [`Runner::start`] take effect on the next start.
    pub fn register(&mut self, daemon: Arc<dyn Daemon>, interval: Duration) -> &mut Self {
        self.registrations.push(Registration { daemon, interval });
        self
    }

    /// Names of the registered daemons, in registration order.
    pub fn daemon_names(&self) -> Vec<&'static str> {
        self.registrations
            .iter()
            .map(|registration| registration.daemon.name())
            .collect()
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    /// Spawns one loop per registered daemon, plus the metrics reporter when configured.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        if self.registrations.is_empty() {
            return Err(anyhow!("runner has no registered daemons"));
        }

        for registration in &self.registrations {
            self.handles.push(spawn_daemon_loop(
                registration.daemon.clone(),
                registration.interval,
                self.shutdown.clone(),
                self.telemetry.clone(),
            ));
        }

        if let Some(interval) = self.metrics_interval {
            self.handles.push(spawn_metrics_reporter(
                self.telemetry.clone(),
                self.shutdown.clone(),
                interval,
            ));
        }

        tracing::info!(daemons = ?self.daemon_names(), "runner started");
        self.started = true;
        Ok(())
    }

    /// Cancels the root token and waits for every loop to finish its current cycle.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }

        self.shutdown.cancel();
        self.join_all().await?;
        self.started = false;
        self.shutdown = CancellationToken::new();
        Ok(())
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.start().await?;
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }

    async fn join_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "daemon task terminated abnormally");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(anyhow!("daemon task failed: {err}")),
            None => Ok(()),
        }
    }
}

use crate::daemons::heartbeat::{DEFAULT_HEARTBEAT_DELAY, DEFAULT_INELIGIBLE_DELAY};
use crate::runtime::telemetry;
use crate::store::LOOPED_COUNTER_THRESHOLD;
use anyhow::{bail, Result};
use std::time::Duration;

const DEFAULT_QUEUE_PARSER_INTERVAL_SECS: u64 = 1;
const DEFAULT_PARAM_REFRESH_INTERVAL_SECS: u64 = 60;

/// Scheduling configuration for the node daemons.
///
/// All instances must be constructed via [`DaemonConfig::builder`] or [`DaemonConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    queue_parser_interval: Duration,
    heartbeat_interval: Duration,
    ineligible_backoff: Duration,
    param_refresh_interval: Duration,
    metrics_interval: Duration,
    looped_tx_threshold: u32,
    lock_lease: Option<Duration>,
}

pub struct DaemonConfigParams {
    pub queue_parser_interval: Duration,
    pub heartbeat_interval: Duration,
    pub ineligible_backoff: Duration,
    pub param_refresh_interval: Duration,
    pub metrics_interval: Duration,
    pub looped_tx_threshold: u32,
    pub lock_lease: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            queue_parser_interval: Duration::from_secs(DEFAULT_QUEUE_PARSER_INTERVAL_SECS),
            heartbeat_interval: DEFAULT_HEARTBEAT_DELAY,
            ineligible_backoff: DEFAULT_INELIGIBLE_DELAY,
            param_refresh_interval: Duration::from_secs(DEFAULT_PARAM_REFRESH_INTERVAL_SECS),
            metrics_interval: telemetry::DEFAULT_METRICS_INTERVAL,
            looped_tx_threshold: LOOPED_COUNTER_THRESHOLD,
            lock_lease: None,
        }
    }
}

impl DaemonConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> DaemonConfigBuilder {
        DaemonConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: DaemonConfigParams) -> Result<Self> {
        let DaemonConfigParams {
            queue_parser_interval,
            heartbeat_interval,
            ineligible_backoff,
            param_refresh_interval,
            metrics_interval,
            looped_tx_threshold,
            lock_lease,
        } = params;

        let config = Self {
            queue_parser_interval,
            heartbeat_interval,
            ineligible_backoff,
            param_refresh_interval,
            metrics_interval,
            looped_tx_threshold,
            lock_lease,
        };

        config.validate()?;
        Ok(config)
    }

    /// Delay between queue parser cycles.
    pub fn queue_parser_interval(&self) -> Duration {
        self.queue_parser_interval
    }

    /// Delay between heartbeat cycles while this node is a registered full node.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Delay between heartbeat cycles while this node is not registered.
    pub fn ineligible_backoff(&self) -> Duration {
        self.ineligible_backoff
    }

    /// Delay between system parameter reloads.
    pub fn param_refresh_interval(&self) -> Duration {
        self.param_refresh_interval
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Failure count above which an unverified, unused queue entry is evicted.
    pub fn looped_tx_threshold(&self) -> u32 {
        self.looped_tx_threshold
    }

    /// Age after which a lock record may be taken over; `None` keeps records until released.
    pub fn lock_lease(&self) -> Option<Duration> {
        self.lock_lease
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.queue_parser_interval.is_zero() {
            bail!("queue_parser_interval must be greater than 0");
        }

        if self.heartbeat_interval.is_zero() {
            bail!("heartbeat_interval must be greater than 0");
        }

        if self.ineligible_backoff.is_zero() {
            bail!("ineligible_backoff must be greater than 0");
        }

        if self.param_refresh_interval.is_zero() {
            bail!("param_refresh_interval must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        if self.looped_tx_threshold == 0 {
            bail!("looped_tx_threshold must be greater than 0");
        }

        if let Some(lease) = self.lock_lease {
            if lease.as_secs() == 0 {
                bail!("lock_lease must be at least one second");
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct DaemonConfigBuilder {
    queue_parser_interval: Option<Duration>,
    heartbeat_interval: Option<Duration>,
    ineligible_backoff: Option<Duration>,
    param_refresh_interval: Option<Duration>,
    metrics_interval: Option<Duration>,
    looped_tx_threshold: Option<u32>,
    lock_lease: Option<Duration>,
}

impl DaemonConfigBuilder {
    pub fn queue_parser_interval(mut self, interval: Duration) -> Self {
        self.queue_parser_interval = Some(interval);
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn ineligible_backoff(mut self, backoff: Duration) -> Self {
        self.ineligible_backoff = Some(backoff);
        self
    }

    pub fn param_refresh_interval(mut self, interval: Duration) -> Self {
        self.param_refresh_interval = Some(interval);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn looped_tx_threshold(mut self, threshold: u32) -> Self {
        self.looped_tx_threshold = Some(threshold);
        self
    }

    pub fn lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = Some(lease);
        self
    }

    pub fn build(self) -> Result<DaemonConfig> {
        let defaults = DaemonConfig::default();
        let params = DaemonConfigParams {
            queue_parser_interval: self
                .queue_parser_interval
                .unwrap_or(defaults.queue_parser_interval),
            heartbeat_interval: self
                .heartbeat_interval
                .unwrap_or(defaults.heartbeat_interval),
            ineligible_backoff: self
                .ineligible_backoff
                .unwrap_or(defaults.ineligible_backoff),
            param_refresh_interval: self
                .param_refresh_interval
                .unwrap_or(defaults.param_refresh_interval),
            metrics_interval: self.metrics_interval.unwrap_or(defaults.metrics_interval),
            looped_tx_threshold: self
                .looped_tx_threshold
                .unwrap_or(defaults.looped_tx_threshold),
            lock_lease: self.lock_lease.or(defaults.lock_lease),
        };

        DaemonConfig::new(params)
    }
}

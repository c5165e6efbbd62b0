use super::{CycleOutcome, CycleReport, Daemon, DaemonError, DaemonFuture, NodeServices};
use crate::params::ParameterCache;
use crate::runtime::telemetry::Telemetry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const PARAM_REFRESH_NAME: &str = "SysParamsRefresh";

/// Keeps the [`ParameterCache`] in step with storage. Read-only with respect
/// to storage, so it runs without an execution lock.
pub struct ParameterRefresher {
    cache: Arc<ParameterCache>,
    telemetry: Arc<Telemetry>,
}

impl ParameterRefresher {
    pub fn new(services: &NodeServices) -> Self {
        Self {
            cache: services.params.clone(),
            telemetry: services.telemetry.clone(),
        }
    }

    pub async fn run(&self) -> Result<CycleReport, DaemonError> {
        self.cache.refresh().await?;
        self.telemetry.record_param_refresh();
        Ok(CycleReport::new(CycleOutcome::Completed))
    }
}

impl Daemon for ParameterRefresher {
    fn name(&self) -> &'static str {
        PARAM_REFRESH_NAME
    }

    fn run_cycle<'a>(&'a self, _token: &'a CancellationToken) -> DaemonFuture<'a> {
        Box::pin(self.run())
    }
}

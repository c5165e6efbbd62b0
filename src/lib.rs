pub mod daemons;
pub mod lock;
pub mod params;
pub mod runtime;
pub mod store;
pub mod tx;

pub use daemons::{
    CycleOutcome, CycleReport, Daemon, DaemonError, DaemonFuture, HeartbeatBuilder,
    NodeServices, ParameterRefresher, QueueParser, TxApplier,
};
pub use lock::{ExecutionLock, LockError, LockGuard};
pub use params::{ParameterCache, ParameterSnapshot};
pub use runtime::clock::{Clock, ManualClock, SystemClock};
pub use runtime::config::{DaemonConfig, DaemonConfigBuilder, DaemonConfigParams};
pub use runtime::runner::Runner;
pub use runtime::scheduler::spawn_daemon_loop;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use store::{MemoryStore, StoreError};
pub use tx::{CodecError, CryptoError, NodeSigner};

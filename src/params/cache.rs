use super::keys;
use crate::store::{ParameterStore, StoreError, SystemParameter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Immutable view of the system parameters plus the operation price table
/// derived from them. A snapshot never changes once published; refreshes
/// publish a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSnapshot {
    values: HashMap<String, String>,
    costs: HashMap<String, i64>,
}

impl ParameterSnapshot {
    fn with_defaults() -> Self {
        let values = keys::DEFAULTS
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        Self {
            values,
            costs: HashMap::new(),
        }
    }

    /// Overlays `parameters` on this snapshot and rebuilds the price table.
    fn merged(&self, parameters: Vec<SystemParameter>) -> Self {
        let mut values = self.values.clone();
        for parameter in parameters {
            values.insert(parameter.name, parameter.value);
        }
        let costs = parse_costs(values.get(keys::OP_PRICE).map(String::as_str));
        Self { values, costs }
    }

    /// Raw value, or an empty string when the parameter is unknown.
    pub fn get_string(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Parses the value as a base-10 `i64`, returning 0 (and logging) when it
    /// is missing or malformed.
    pub fn get_i64(&self, name: &str) -> i64 {
        parse_or_zero(name, self.get_string(name))
    }

    /// Same as [`Self::get_i64`] at the platform's native width (64-bit on
    /// the targets nodes run on).
    pub fn get_int(&self, name: &str) -> isize {
        parse_or_zero(name, self.get_string(name))
    }

    pub fn get_cost(&self, operation: &str) -> i64 {
        self.costs.get(operation).copied().unwrap_or(0)
    }

    pub fn costs(&self) -> &HashMap<String, i64> {
        &self.costs
    }
}

fn parse_or_zero<T>(name: &str, raw: &str) -> T
where
    T: std::str::FromStr + Default,
{
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                parameter = name,
                value = raw,
                "system parameter is not a valid integer; using 0"
            );
            T::default()
        }
    }
}

fn parse_costs(raw: Option<&str>) -> HashMap<String, i64> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return HashMap::new();
    };

    match serde_json::from_str(raw) {
        Ok(costs) => costs,
        Err(err) => {
            tracing::warn!(
                parameter = keys::OP_PRICE,
                error = %err,
                "operation price table is malformed; all operation costs reset to 0"
            );
            HashMap::new()
        }
    }
}

/// Process-wide cache of system parameters.
///
/// Readers clone the current [`ParameterSnapshot`] pointer and never block one
/// another. [`ParameterCache::refresh`] builds the replacement snapshot off to
/// the side and publishes it with a single pointer swap, so no reader can see
/// the value map and the price table from different refreshes.
pub struct ParameterCache {
    source: Arc<dyn ParameterStore>,
    current: RwLock<Arc<ParameterSnapshot>>,
    refresh_gate: Mutex<()>,
}

impl ParameterCache {
    /// Creates a cache seeded with the built-in defaults. Nothing is read from
    /// storage until the first [`ParameterCache::refresh`].
    pub fn new(source: Arc<dyn ParameterStore>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(ParameterSnapshot::with_defaults())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Reloads every parameter from storage.
    ///
    /// On a storage error the current snapshot stays published and the error
    /// is returned. A malformed price table is not an error: the new snapshot
    /// simply carries no costs.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let _gate = self.refresh_gate.lock().await;

        let parameters = match self.source.system_parameters().await {
            Ok(parameters) => parameters,
            Err(err) => {
                tracing::error!(error = %err, "failed to load system parameters");
                return Err(err);
            }
        };

        let loaded = parameters.len();
        let next = Arc::new(self.snapshot().merged(parameters));
        *self.current.write() = next;

        tracing::debug!(loaded, "system parameters refreshed");
        Ok(())
    }

    /// Current snapshot. Use it when several reads must agree with each other.
    pub fn snapshot(&self) -> Arc<ParameterSnapshot> {
        self.current.read().clone()
    }

    pub fn get_string(&self, name: &str) -> String {
        self.snapshot().get_string(name).to_owned()
    }

    pub fn get_i64(&self, name: &str) -> i64 {
        self.snapshot().get_i64(name)
    }

    pub fn get_int(&self, name: &str) -> isize {
        self.snapshot().get_int(name)
    }

    pub fn get_cost(&self, operation: &str) -> i64 {
        self.snapshot().get_cost(operation)
    }

    pub fn blockchain_url(&self) -> String {
        self.get_string(keys::BLOCKCHAIN_URL)
    }

    pub fn fuel_rate(&self) -> String {
        self.get_string(keys::FUEL_RATE)
    }

    pub fn number_of_nodes(&self) -> i64 {
        self.get_i64(keys::NUMBER_OF_NODES)
    }

    pub fn gaps_between_blocks(&self) -> isize {
        self.get_int(keys::GAPS_BETWEEN_BLOCKS)
    }

    pub fn max_block_size(&self) -> i64 {
        self.get_i64(keys::MAX_BLOCK_SIZE)
    }

    pub fn max_tx_size(&self) -> i64 {
        self.get_i64(keys::MAX_TX_SIZE)
    }

    pub fn max_tx_count(&self) -> isize {
        self.get_int(keys::MAX_TX_COUNT)
    }

    pub fn max_columns(&self) -> isize {
        self.get_int(keys::MAX_COLUMNS)
    }

    pub fn max_indexes(&self) -> isize {
        self.get_int(keys::MAX_INDEXES)
    }

    pub fn max_block_user_tx(&self) -> isize {
        self.get_int(keys::MAX_BLOCK_USER_TX)
    }

    /// Minimum seconds between two heartbeats of one full node.
    pub fn upd_full_nodes_period(&self) -> i64 {
        self.get_i64(keys::UPD_FULL_NODES_PERIOD)
    }

    /// [`Self::upd_full_nodes_period`] as a duration; negative values clamp to zero.
    pub fn upd_full_nodes_interval(&self) -> Duration {
        Duration::from_secs(self.upd_full_nodes_period().max(0) as u64)
    }

    pub fn recovery_address(&self) -> i64 {
        self.get_i64(keys::RECOVERY_ADDRESS)
    }

    pub fn commission_wallet(&self) -> i64 {
        self.get_i64(keys::COMMISSION_WALLET)
    }
}

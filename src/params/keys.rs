//! Names of the system parameters read by the node and the values used until
//! storage provides them.

/// Number of DLT nodes in the network.
pub const NUMBER_OF_NODES: &str = "number_of_dlt_nodes";
/// Fuel exchange rate.
pub const FUEL_RATE: &str = "fuel_rate";
/// JSON object mapping operation names to prices.
pub const OP_PRICE: &str = "op_price";
/// Seconds between blocks.
pub const GAPS_BETWEEN_BLOCKS: &str = "gaps_between_blocks";
/// Location of a blockchain file for nodes that bootstrap without peers.
pub const BLOCKCHAIN_URL: &str = "blockchain_url";
pub const MAX_BLOCK_SIZE: &str = "max_block_size";
pub const MAX_TX_SIZE: &str = "max_tx_size";
pub const MAX_TX_COUNT: &str = "max_tx_count";
/// Maximum columns per table.
pub const MAX_COLUMNS: &str = "max_columns";
/// Maximum indexes per table.
pub const MAX_INDEXES: &str = "max_indexes";
/// Maximum transactions one user may place in a block.
pub const MAX_BLOCK_USER_TX: &str = "max_block_user_tx";
/// Minimum seconds between two heartbeats from the same full node.
pub const UPD_FULL_NODES_PERIOD: &str = "upd_full_nodes_period";
pub const RECOVERY_ADDRESS: &str = "recovery_address";
/// Wallet collecting commissions.
pub const COMMISSION_WALLET: &str = "commission_wallet";

pub const DEFAULT_BLOCKCHAIN_URL: &str =
    "https://raw.githubusercontent.com/egaas-blockchain/egaas-blockchain.github.io/master/testnet_blockchain";
const DEFAULT_SYSTEM_WALLET: &str = "8275283526439353759";

/// Values seeded into a fresh cache.
pub const DEFAULTS: &[(&str, &str)] = &[
    (BLOCKCHAIN_URL, DEFAULT_BLOCKCHAIN_URL),
    (GAPS_BETWEEN_BLOCKS, "3"),
    (MAX_BLOCK_SIZE, "67108864"),
    (MAX_TX_SIZE, "33554432"),
    (MAX_TX_COUNT, "100000"),
    (MAX_COLUMNS, "50"),
    (MAX_INDEXES, "10"),
    (MAX_BLOCK_USER_TX, "100"),
    (UPD_FULL_NODES_PERIOD, "3600"),
    (RECOVERY_ADDRESS, DEFAULT_SYSTEM_WALLET),
    (COMMISSION_WALLET, DEFAULT_SYSTEM_WALLET),
];

//! Heartbeat transaction construction: header layout, canonical signing
//! payload, wire encoding, hashing and node-key signing.

pub mod codec;
pub mod header;
pub mod signing;

pub use codec::{tx_hash, CodecError, HEARTBEAT_TX_MARKER};
pub use header::{SmartContractTx, TxHeader};
pub use signing::{CryptoError, NodeSigner};

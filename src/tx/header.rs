use serde::{Deserialize, Serialize};

/// Header shared by smart-contract transactions.
///
/// `signatures` carries the length-prefixed signature once the header has been
/// signed; it is empty while the signing payload is computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHeader {
    pub tx_type: i64,
    pub time: i64,
    pub wallet_id: i64,
    pub state_id: i64,
    pub signatures: Vec<u8>,
}

impl TxHeader {
    pub fn new(tx_type: i64, time: i64, wallet_id: i64, state_id: i64) -> Self {
        Self {
            tx_type,
            time,
            wallet_id,
            state_id,
            signatures: Vec::new(),
        }
    }

    /// Canonical payload that is signed by the sender and re-derived by every
    /// verifier. Signatures are never part of it.
    pub fn for_sign(&self) -> String {
        format!(
            "{},{},{},{}",
            self.tx_type, self.time, self.wallet_id, self.state_id
        )
    }

    pub fn with_signatures(mut self, signatures: Vec<u8>) -> Self {
        self.signatures = signatures;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartContractTx {
    pub header: TxHeader,
    pub data: Vec<u8>,
}

//! Wire encoding for system transactions.
//!
//! A heartbeat on the wire is the marker byte followed by the bincode encoding
//! of [`SmartContractTx`]. Signatures inside the header use the compact length
//! prefix from [`encode_length_plus_data`].
//!
//! The body format is local to this crate. Nodes that exchange heartbeats with
//! peers encoding the body as MessagePack must swap the body codec; the marker
//! byte, the length prefix and [`tx_hash`] stay the same.

use super::header::SmartContractTx;
use sha2::{Digest, Sha256};

/// First byte of every full-node heartbeat transaction.
pub const HEARTBEAT_TX_MARKER: u8 = 128;

const SHORT_LENGTH_MAX: usize = 127;
const LONG_LENGTH_FLAG: u8 = 0x80;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode transaction: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode transaction: {0}")]
    Decode(#[source] bincode::Error),
    #[error("expected transaction marker {expected}, found {found:?}")]
    UnexpectedMarker { expected: u8, found: Option<u8> },
    #[error("length prefix is truncated or malformed")]
    MalformedLength,
}

/// Encodes `length` as one byte when it fits in seven bits; otherwise as
/// `0x80 | n` followed by the `n` significant little-endian bytes.
pub fn encode_length(length: usize) -> Vec<u8> {
    if length <= SHORT_LENGTH_MAX {
        return vec![length as u8];
    }

    let bytes = (length as u64).to_le_bytes();
    let significant = bytes
        .iter()
        .rposition(|byte| *byte != 0)
        .map(|index| index + 1)
        .unwrap_or(1);

    let mut encoded = Vec::with_capacity(significant + 1);
    encoded.push(LONG_LENGTH_FLAG | significant as u8);
    encoded.extend_from_slice(&bytes[..significant]);
    encoded
}

pub fn encode_length_plus_data(data: &[u8]) -> Vec<u8> {
    let mut encoded = encode_length(data.len());
    encoded.extend_from_slice(data);
    encoded
}

/// Splits a length-prefixed buffer into its payload and the remaining bytes.
pub fn decode_length_plus_data(input: &[u8]) -> Result<(&[u8], &[u8]), CodecError> {
    let (&first, rest) = input.split_first().ok_or(CodecError::MalformedLength)?;

    let (length, rest) = if first & LONG_LENGTH_FLAG == 0 {
        (first as usize, rest)
    } else {
        let width = (first & !LONG_LENGTH_FLAG) as usize;
        if width == 0 || width > 8 || rest.len() < width {
            return Err(CodecError::MalformedLength);
        }
        let mut bytes = [0u8; 8];
        bytes[..width].copy_from_slice(&rest[..width]);
        let length =
            usize::try_from(u64::from_le_bytes(bytes)).map_err(|_| CodecError::MalformedLength)?;
        (length, &rest[width..])
    };

    if rest.len() < length {
        return Err(CodecError::MalformedLength);
    }
    Ok(rest.split_at(length))
}

/// Marker byte plus the serialized transaction.
pub fn encode_heartbeat(tx: &SmartContractTx) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(tx).map_err(CodecError::Encode)?;
    let mut data = Vec::with_capacity(body.len() + 1);
    data.push(HEARTBEAT_TX_MARKER);
    data.extend_from_slice(&body);
    Ok(data)
}

pub fn decode_heartbeat(data: &[u8]) -> Result<SmartContractTx, CodecError> {
    match data.split_first() {
        Some((&HEARTBEAT_TX_MARKER, body)) => {
            bincode::deserialize(body).map_err(CodecError::Decode)
        }
        other => Err(CodecError::UnexpectedMarker {
            expected: HEARTBEAT_TX_MARKER,
            found: other.map(|(marker, _)| *marker),
        }),
    }
}

/// Canonical transaction hash (SHA-256 over the exact wire bytes).
pub fn tx_hash(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

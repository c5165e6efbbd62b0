use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

const SEED_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error(
        "node private key must be {} raw bytes or {} hex characters, got {len} bytes",
        SEED_LEN,
        SEED_LEN * 2
    )]
    InvalidKeyLength { len: usize },
    #[error("node private key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("signature is malformed: {0}")]
    MalformedSignature(#[source] ed25519_dalek::SignatureError),
    #[error("signature verification failed: {0}")]
    Verification(#[source] ed25519_dalek::SignatureError),
}

/// Signs system transactions with the node key.
pub struct NodeSigner {
    key: SigningKey,
}

impl NodeSigner {
    /// Accepts the stored private key either as a raw 32-byte seed or as its
    /// 64-character hex rendering.
    pub fn from_private_key(stored: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; SEED_LEN] = match stored.len() {
            SEED_LEN => stored
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength { len: stored.len() })?,
            len if len == SEED_LEN * 2 => {
                let decoded = hex::decode(stored)?;
                decoded
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKeyLength { len: decoded.len() })?
            }
            len => return Err(CryptoError::InvalidKeyLength { len }),
        };

        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_bytes().to_vec()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

pub fn verify_signature(
    public_key: &VerifyingKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let signature = Signature::from_slice(signature).map_err(CryptoError::MalformedSignature)?;
    public_key
        .verify(message, &signature)
        .map_err(CryptoError::Verification)
}

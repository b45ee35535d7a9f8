use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unsupported extra-data version {0}")]
    UnsupportedExtraVersion(u8),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

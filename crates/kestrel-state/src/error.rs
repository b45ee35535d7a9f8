use thiserror::Error;

use kestrel_core::Hash;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Block already exists at height {0}")]
    BlockExists(u64),

    #[error("Block at height {height} does not extend head (expected height {expected})")]
    NonContiguous { height: u64, expected: u64 },

    #[error("Block parent {0} is not the chain head")]
    UnknownParent(Hash),

    #[error("Chain has no genesis block")]
    NoGenesis,

    #[error("Core error: {0}")]
    Core(#[from] kestrel_core::CoreError),
}

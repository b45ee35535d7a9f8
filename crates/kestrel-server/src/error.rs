use std::time::Duration;

use kestrel_core::{Address, Hash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown block")]
    UnknownBlock,

    #[error("Unknown ancestor {0}")]
    UnknownParent(Hash),

    #[error("Block is {0:?} in the future")]
    FutureBlock(Duration),

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Invalid transaction root")]
    InvalidTxRoot,

    #[error("Invalid extra data: {0}")]
    InvalidExtra(&'static str),

    #[error("Invalid vote")]
    InvalidVote,

    #[error("Invalid voting chain")]
    InvalidVotingChain,

    #[error("Unauthorized verifier {0}")]
    Unauthorized(Address),

    #[error("Empty committed seals")]
    EmptyCommittedSeals,

    #[error("Invalid committed seals")]
    InvalidCommittedSeals,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Consensus error: {0}")]
    Consensus(#[from] kestrel_consensus::ConsensusError),

    #[error("State error: {0}")]
    State(#[from] kestrel_state::StateError),

    #[error("Core error: {0}")]
    Core(#[from] kestrel_core::CoreError),
}

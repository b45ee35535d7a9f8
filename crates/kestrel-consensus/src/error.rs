use std::time::Duration;

use kestrel_core::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Invalid message")]
    InvalidMessage,

    #[error("Failed to decode {0} payload")]
    Decode(&'static str),

    #[error("Future message")]
    FutureMessage,

    #[error("Old message")]
    OldMessage,

    #[error("Message does not come from the proposer")]
    NotProposer,

    #[error("Inconsistent subject")]
    InconsistentSubject,

    #[error("Unauthorized address {0}")]
    UnauthorizedAddress(Address),

    #[error("Invalid committed seal from {0}")]
    InvalidCommittedSeal(Address),

    #[error("Message ignored")]
    Ignored,

    #[error("Proposal is not yet valid, retry in {0:?}")]
    FutureProposal(Duration),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Consensus engine already started")]
    EngineStarted,

    #[error("Consensus engine not started")]
    EngineStopped,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Core error: {0}")]
    Core(#[from] kestrel_core::CoreError),
}

/// Outcome of [`crate::Backend::verify`] for a proposal that is not accepted
#[derive(Debug, Clone, Error)]
pub enum ProposalError {
    /// Proposal is well-formed but timestamped ahead of local time
    #[error("Proposal is {0:?} ahead of local time")]
    Future(Duration),

    #[error("{0}")]
    Invalid(String),
}

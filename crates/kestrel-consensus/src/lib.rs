//! Kestrel Consensus - IBFT-style BFT agreement
//!
//! This crate holds the round-based three-phase commit engine: verifier sets
//! with proposer selection, per-view message tallies, round changes, the
//! backlog of early messages and the single-task event loop that drives them.
//! Everything chain-specific sits behind the [`Backend`] trait.

pub mod backend;
pub mod backlog;
pub mod config;
pub mod error;
pub mod engine;
pub mod events;
pub mod message;
pub mod message_set;
pub mod round_change;
pub mod round_state;
pub mod types;
pub mod verifier;

pub use backend::Backend;
pub use backlog::Backlog;
pub use config::BftConfig;
pub use engine::{ConsensusContext, Core};
pub use error::{ConsensusError, ProposalError};
pub use events::{CoreEvent, EventMux};
pub use message::{committed_seal_data, Message, MessageCode};
pub use message_set::MessageSet;
pub use round_change::RoundChangeSet;
pub use round_state::RoundState;
pub use types::{Preprepare, Proposal, Request, State, Subject, View};
pub use verifier::{ProposerPolicy, VerifierSet};

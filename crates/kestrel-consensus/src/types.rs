use std::fmt;

use kestrel_core::{Block, Hash};
use serde::{Deserialize, Serialize};

/// Consensus position. Ordering is by sequence, then round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct View {
    pub sequence: u64,
    pub round: u64,
}

impl View {
    pub fn new(sequence: u64, round: u64) -> Self {
        View { sequence, round }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(seq {}, round {})", self.sequence, self.round)
    }
}

/// The value agreed on. Height doubles as the consensus sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proposal {
    Block(Block),
}

impl Proposal {
    pub fn height(&self) -> u64 {
        match self {
            Proposal::Block(block) => block.height(),
        }
    }

    pub fn hash(&self) -> Hash {
        match self {
            Proposal::Block(block) => block.hash(),
        }
    }

    pub fn as_block(&self) -> &Block {
        match self {
            Proposal::Block(block) => block,
        }
    }
}

impl From<Block> for Proposal {
    fn from(block: Block) -> Self {
        Proposal::Block(block)
    }
}

/// A proposal handed to the engine by block production
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub proposal: Proposal,
}

/// PRE-PREPARE payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preprepare {
    pub view: View,
    pub proposal: Proposal,
}

/// PREPARE, COMMIT and ROUND_CHANGE payload.
/// ROUND_CHANGE always carries a zero digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub view: View,
    pub digest: Hash,
}

/// Phase within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    AcceptRequest,
    Preprepared,
    Prepared,
    Committed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::AcceptRequest => "Accept request",
            State::Preprepared => "Preprepared",
            State::Prepared => "Prepared",
            State::Committed => "Committed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_ordering_is_lexicographic() {
        assert!(View::new(1, 9) < View::new(2, 0));
        assert!(View::new(2, 0) < View::new(2, 1));
        assert_eq!(View::new(3, 3), View::new(3, 3));
    }

    #[test]
    fn test_state_ordering() {
        assert!(State::AcceptRequest < State::Preprepared);
        assert!(State::Preprepared < State::Prepared);
        assert!(State::Prepared < State::Committed);
    }
}

use std::collections::BTreeMap;

use crate::error::ConsensusError;
use crate::message::Message;
use crate::message_set::MessageSet;
use crate::types::View;
use crate::verifier::VerifierSet;

/// ROUND_CHANGE tallies for the current sequence, keyed by target round
#[derive(Debug)]
pub struct RoundChangeSet {
    verifiers: VerifierSet,
    round_changes: BTreeMap<u64, MessageSet>,
}

impl RoundChangeSet {
    pub fn new(verifiers: VerifierSet) -> Self {
        RoundChangeSet {
            verifiers,
            round_changes: BTreeMap::new(),
        }
    }

    /// Record a ROUND_CHANGE for `view.round`; returns the tally for that round
    pub fn add(&mut self, view: View, msg: Message) -> Result<usize, ConsensusError> {
        let set = self
            .round_changes
            .entry(view.round)
            .or_insert_with(|| MessageSet::new(view, self.verifiers.clone()));
        set.add(msg)?;
        Ok(set.size())
    }

    /// Forget tallies for rounds below `round`, and any empty tally
    pub fn clear(&mut self, round: u64) {
        self.round_changes
            .retain(|r, set| *r >= round && set.size() > 0);
    }

    /// Highest round with at least `threshold` ROUND_CHANGE messages
    pub fn max_round(&self, threshold: usize) -> Option<u64> {
        self.round_changes
            .iter()
            .rev()
            .find(|(_, set)| set.size() >= threshold)
            .map(|(round, _)| *round)
    }
}

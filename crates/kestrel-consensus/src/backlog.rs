use std::collections::{BTreeMap, HashMap};

use kestrel_core::Address;

use crate::error::ConsensusError;
use crate::message::{Message, MessageCode};
use crate::types::View;
use crate::verifier::VerifierSet;

/// Replay key: earlier views first, then PRE-PREPARE, COMMIT, PREPARE.
/// ROUND_CHANGE sorts ahead of every other message of its sequence.
pub fn priority(code: MessageCode, view: &View) -> u64 {
    let base = view.sequence.saturating_mul(1000);
    match code {
        MessageCode::RoundChange => base,
        _ => base
            .saturating_add(view.round.saturating_mul(10))
            .saturating_add(code.rank()),
    }
}

/// Early messages held per sender until the local view catches up
#[derive(Debug, Default)]
pub struct Backlog {
    // (priority, arrival) keeps ties in arrival order
    queues: HashMap<Address, BTreeMap<(u64, u64), (View, Message)>>,
    arrivals: u64,
}

impl Backlog {
    pub fn new() -> Self {
        Backlog::default()
    }

    pub fn push(&mut self, msg: Message, view: View) {
        let key = (priority(msg.code, &view), self.arrivals);
        self.arrivals += 1;
        self.queues
            .entry(msg.address)
            .or_default()
            .insert(key, (view, msg));
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Pop every message `check` no longer classifies as future.
    ///
    /// Queues of senders outside `verifiers` are dropped. Each sender's queue
    /// is drained in priority order and stops at the first future message.
    pub fn drain_ready<F>(&mut self, verifiers: &VerifierSet, mut check: F) -> Vec<Message>
    where
        F: FnMut(MessageCode, &View) -> Result<(), ConsensusError>,
    {
        self.queues.retain(|sender, _| verifiers.contains(sender));

        let mut ready = Vec::new();
        for queue in self.queues.values_mut() {
            while let Some(entry) = queue.first_entry() {
                let (view, msg) = entry.get();
                if let Err(ConsensusError::FutureMessage) = check(msg.code, view) {
                    break;
                }
                let (_, msg) = entry.remove();
                ready.push(msg);
            }
        }

        self.queues.retain(|_, queue| !queue.is_empty());
        ready
    }
}

use kestrel_core::{serialize, Seal};
use tracing::{error, info, warn};

use super::context::ConsensusContext;
use crate::backend::Backend;
use crate::error::ConsensusError;
use crate::message::{committed_seal_data, Message, MessageCode};
use crate::types::{State, Subject};

impl<B: Backend> ConsensusContext<B> {
    pub(super) fn send_commit(&mut self) {
        if let Some(subject) = self.current.subject() {
            self.broadcast_commit(subject);
        }
    }

    /// COMMIT for `subject`, carrying our seal over its digest
    pub(super) fn broadcast_commit(&mut self, subject: Subject) {
        let payload = match serialize::to_bytes(&subject) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode commit: {}", e);
                return;
            }
        };
        let committed_seal = match self.backend.sign(&committed_seal_data(&subject.digest)) {
            Ok(seal) => seal,
            Err(e) => {
                error!("Failed to sign committed seal: {}", e);
                return;
            }
        };

        let mut msg = Message::new(MessageCode::Commit, payload);
        msg.committed_seal = Some(committed_seal);
        self.broadcast(msg);
    }

    pub(super) fn handle_commit(&mut self, msg: &Message) -> Result<(), ConsensusError> {
        let commit = msg.decode_subject()?;
        self.check_message(MessageCode::Commit, &commit.view)?;
        self.verify_subject(&commit)?;

        let seal = msg
            .committed_seal
            .ok_or(ConsensusError::InvalidCommittedSeal(msg.address))?;
        self.backend
            .check_signature(&committed_seal_data(&commit.digest), &msg.address, &seal)
            .map_err(|_| ConsensusError::InvalidCommittedSeal(msg.address))?;

        self.current.commits().add(msg.clone())?;

        if self.current.commits().size() > 2 * self.verifiers.f() && self.state < State::Committed {
            self.current.lock_hash();
            self.commit();
        }
        Ok(())
    }

    fn commit(&mut self) {
        self.set_state(State::Committed);

        let Some(proposal) = self.current.proposal().cloned() else {
            return;
        };
        let seals: Vec<Seal> = self
            .current
            .commits()
            .values()
            .into_iter()
            .filter_map(|msg| msg.committed_seal)
            .collect();

        info!(
            "Committing {} at height {} with {} seals",
            proposal.hash().short(),
            proposal.height(),
            seals.len()
        );
        if let Err(e) = self.backend.commit(&proposal, seals) {
            warn!("Failed to commit proposal at height {}: {}", proposal.height(), e);
            self.current.unlock_hash();
            self.send_next_round_change();
        }
    }
}

use kestrel_core::{serialize, Hash};
use tracing::{debug, error, warn};

use super::context::ConsensusContext;
use crate::backend::Backend;
use crate::error::{ConsensusError, ProposalError};
use crate::message::{Message, MessageCode};
use crate::types::{Preprepare, Request, State, Subject, View};

impl<B: Backend> ConsensusContext<B> {
    pub(super) fn send_preprepare(&mut self, request: &Request) {
        if self.current.sequence() != request.proposal.height() || !self.is_proposer() {
            return;
        }

        let preprepare = Preprepare {
            view: self.current.view(),
            proposal: request.proposal.clone(),
        };
        match serialize::to_bytes(&preprepare) {
            Ok(payload) => {
                debug!(
                    "Proposing {} at {}",
                    request.proposal.hash().short(),
                    preprepare.view
                );
                self.broadcast(Message::new(MessageCode::Preprepare, payload));
            }
            Err(e) => error!("Failed to encode preprepare: {}", e),
        }
    }

    pub(super) fn handle_preprepare(&mut self, msg: &Message) -> Result<(), ConsensusError> {
        let preprepare = msg.decode_preprepare()?;

        if let Err(e) = self.check_message(MessageCode::Preprepare, &preprepare.view) {
            if let ConsensusError::OldMessage = e {
                if self.answer_old_preprepare(msg, &preprepare) {
                    return Ok(());
                }
            }
            return Err(e);
        }

        if !self.verifiers.is_proposer(&msg.address) {
            warn!("Ignoring preprepare from non-proposer {}", msg.address);
            return Err(ConsensusError::NotProposer);
        }

        match self.backend.verify(&preprepare.proposal) {
            Ok(()) => {}
            Err(ProposalError::Future(delay)) => {
                debug!("Proposal is {:?} early, scheduling retry", delay);
                self.schedule_future_preprepare(delay, msg.clone());
                return Err(ConsensusError::FutureProposal(delay));
            }
            Err(ProposalError::Invalid(reason)) => {
                warn!("Rejecting proposal {}: {}", preprepare.proposal.hash().short(), reason);
                self.send_next_round_change();
                return Err(ConsensusError::InvalidProposal(reason));
            }
        }

        if self.state != State::AcceptRequest {
            return Ok(());
        }

        if self.is_hash_locked() && self.current.locked_hash() != Some(preprepare.proposal.hash()) {
            warn!(
                "Proposal {} conflicts with locked hash",
                preprepare.proposal.hash().short()
            );
            self.send_next_round_change();
            return Ok(());
        }

        // Our committed seal goes out now, so later rounds at this height
        // may only carry this proposal.
        self.current.set_preprepare(preprepare);
        self.current.lock_hash();
        self.set_state(State::Preprepared);
        self.send_commit();
        Ok(())
    }

    /// A lagging proposer re-sent a block we already committed: send our
    /// commit for it so it can finish. Returns false if this is not the case.
    fn answer_old_preprepare(&mut self, msg: &Message, preprepare: &Preprepare) -> bool {
        let proposal = &preprepare.proposal;
        let mut parent_verifiers = self.backend.parent_verifiers(proposal);
        let previous_proposer = self
            .backend
            .get_proposer(proposal.height().saturating_sub(1));
        parent_verifiers.calc_proposer(&previous_proposer, preprepare.view.round);

        let hash = proposal.hash();
        if parent_verifiers.is_proposer(&msg.address) && self.backend.has_proposal(&hash) {
            debug!("Answering old preprepare for {} at {}", hash.short(), preprepare.view);
            self.send_commit_for_old_block(preprepare.view, hash);
            return true;
        }
        false
    }

    fn send_commit_for_old_block(&mut self, view: View, digest: Hash) {
        self.broadcast_commit(Subject { view, digest });
    }
}

use kestrel_core::{serialize, Hash};
use tracing::{debug, error, warn};

use super::context::ConsensusContext;
use crate::backend::Backend;
use crate::error::ConsensusError;
use crate::message::{Message, MessageCode};
use crate::types::{Subject, View};

impl<B: Backend> ConsensusContext<B> {
    pub(super) fn send_next_round_change(&mut self) {
        let next = self.current.round() + 1;
        self.send_round_change(next);
    }

    /// Move to `round` of the current sequence and announce it
    pub(super) fn send_round_change(&mut self, round: u64) {
        let current = self.current.view();
        if current.round >= round {
            warn!("Round change to {} from {} is not forward", round, current);
            return;
        }

        self.catch_up_round(View::new(current.sequence, round));

        let subject = Subject {
            view: self.current.view(),
            digest: Hash::ZERO,
        };
        match serialize::to_bytes(&subject) {
            Ok(payload) => self.broadcast(Message::new(MessageCode::RoundChange, payload)),
            Err(e) => error!("Failed to encode round change: {}", e),
        }
    }

    /// F+1 ROUND_CHANGEs for a later round pull a waiting node forward;
    /// 2F+1 start that round.
    pub(super) fn handle_round_change(&mut self, msg: &Message) -> Result<(), ConsensusError> {
        let round_change = msg.decode_subject()?;
        self.check_message(MessageCode::RoundChange, &round_change.view)?;

        let current = self.current.view();
        let target = round_change.view.round;
        let count = self.round_change_set.add(round_change.view, msg.clone())?;
        let f = self.verifiers.f();

        if self.waiting_for_round_change && count == f + 1 {
            if current.round < target {
                debug!("Round change quorum forming for round {}, catching up", target);
                self.send_round_change(target);
            }
            Ok(())
        } else if count == 2 * f + 1 && (self.waiting_for_round_change || current.round < target) {
            debug!("Round change quorum reached for round {}", target);
            self.start_new_round(target);
            Ok(())
        } else if current.round < target {
            Err(ConsensusError::Ignored)
        } else {
            Ok(())
        }
    }

    /// Round timer expired at the current view
    pub(super) fn handle_timeout(&mut self) {
        if !self.waiting_for_round_change {
            let threshold = self.verifiers.f() + 1;
            if let Some(max_round) = self.round_change_set.max_round(threshold) {
                if max_round > self.current.round() {
                    self.send_round_change(max_round);
                    return;
                }
            }
        }

        let caught_up = self
            .backend
            .last_proposal()
            .is_some_and(|(proposal, _)| proposal.height() >= self.current.sequence());
        if caught_up {
            debug!("Round timeout after commit, starting next sequence");
            self.start_new_round(0);
        } else {
            debug!("Round timeout at {}", self.current.view());
            self.send_next_round_change();
        }
    }
}

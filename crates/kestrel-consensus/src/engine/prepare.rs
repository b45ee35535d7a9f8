use tracing::debug;

use super::context::ConsensusContext;
use crate::backend::Backend;
use crate::error::ConsensusError;
use crate::message::{Message, MessageCode};
use crate::types::State;

impl<B: Backend> ConsensusContext<B> {
    pub(super) fn handle_prepare(&mut self, msg: &Message) -> Result<(), ConsensusError> {
        let prepare = msg.decode_subject()?;
        self.check_message(MessageCode::Prepare, &prepare.view)?;
        self.verify_subject(&prepare)?;
        self.current.prepares().add(msg.clone())?;

        let locked_on_digest =
            self.is_hash_locked() && self.current.locked_hash() == Some(prepare.digest);
        let quorum = self.current.prepare_or_commit_size() > 2 * self.verifiers.f();

        if (locked_on_digest || quorum) && self.state < State::Prepared {
            debug!("Prepared {} at {}", prepare.digest.short(), prepare.view);
            self.current.lock_hash();
            self.set_state(State::Prepared);
            if self.current.commits().get(&self.address).is_none() {
                self.send_commit();
            }
        }
        Ok(())
    }
}

use tracing::{debug, error, trace, warn};

use super::context::ConsensusContext;
use crate::backend::Backend;
use crate::error::ConsensusError;
use crate::events::CoreEvent;
use crate::message::{Message, MessageCode};
use crate::types::{Request, State, Subject, View};

impl<B: Backend> ConsensusContext<B> {
    pub fn handle_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Request(proposal) => {
                let height = proposal.height();
                if let Err(e) = self.handle_request(Request { proposal }) {
                    match e {
                        ConsensusError::FutureMessage => {
                            debug!("Stored future request for height {}", height)
                        }
                        e => debug!("Request for height {} not handled: {}", height, e),
                    }
                }
            }
            CoreEvent::Message(payload) => match self.handle_msg(&payload) {
                Ok(()) => self.gossip(payload),
                Err(e) => trace!("Message not handled: {}", e),
            },
            CoreEvent::Backlog(msg) => {
                let encoded = msg.encode();
                match self.handle_checked_msg(msg) {
                    Ok(()) => match encoded {
                        Ok(payload) => self.gossip(payload),
                        Err(e) => error!("Failed to encode backlog message: {}", e),
                    },
                    Err(e) => trace!("Backlog message not handled: {}", e),
                }
            }
            CoreEvent::Timeout(view) => {
                if view == self.current.view() {
                    self.handle_timeout();
                }
            }
            CoreEvent::FinalCommitted => {
                debug!("Received final committed event");
                self.start_new_round(0);
            }
        }
    }

    /// Decode, authenticate and dispatch a message from the wire
    pub(super) fn handle_msg(&mut self, payload: &[u8]) -> Result<(), ConsensusError> {
        let msg = Message::decode(payload)?;
        let seal = msg.signature.ok_or(ConsensusError::InvalidMessage)?;
        self.backend
            .check_signature(&msg.signing_bytes()?, &msg.address, &seal)?;

        if !self.verifiers.contains(&msg.address) {
            return Err(ConsensusError::UnauthorizedAddress(msg.address));
        }

        self.handle_checked_msg(msg)
    }

    pub(super) fn handle_checked_msg(&mut self, msg: Message) -> Result<(), ConsensusError> {
        let result = match msg.code {
            MessageCode::Preprepare => self.handle_preprepare(&msg),
            MessageCode::Prepare => self.handle_prepare(&msg),
            MessageCode::Commit => self.handle_commit(&msg),
            MessageCode::RoundChange => self.handle_round_change(&msg),
        };

        if let Err(ConsensusError::FutureMessage) = result {
            self.store_backlog(msg);
        }
        result
    }

    /// Classify a message view against the current one.
    ///
    /// ROUND_CHANGE for a later round of the current sequence is current;
    /// everything else must match the view exactly, and outside PRE-PREPARE
    /// waits for a proposal to be accepted.
    pub(super) fn check_message(&self, code: MessageCode, view: &View) -> Result<(), ConsensusError> {
        let current = self.current.view();

        if code == MessageCode::RoundChange {
            if view.sequence > current.sequence {
                return Err(ConsensusError::FutureMessage);
            }
            if *view < current {
                return Err(ConsensusError::OldMessage);
            }
            return Ok(());
        }

        if *view > current {
            return Err(ConsensusError::FutureMessage);
        }
        if *view < current {
            return Err(ConsensusError::OldMessage);
        }
        if self.waiting_for_round_change {
            return Err(ConsensusError::FutureMessage);
        }
        if self.state == State::AcceptRequest && code != MessageCode::Preprepare {
            return Err(ConsensusError::FutureMessage);
        }
        Ok(())
    }

    pub(super) fn verify_subject(&self, subject: &Subject) -> Result<(), ConsensusError> {
        match self.current.subject() {
            Some(current) if current == *subject => Ok(()),
            _ => Err(ConsensusError::InconsistentSubject),
        }
    }

    fn store_backlog(&mut self, msg: Message) {
        if msg.address == self.address {
            warn!("Not storing our own future {} message", msg.code);
            return;
        }
        match msg.view() {
            Ok(view) => {
                trace!("Backlogging {} from {} for {}", msg.code, msg.address, view);
                self.backlog.push(msg, view);
            }
            Err(e) => debug!("Dropping undecodable future message: {}", e),
        }
    }

    /// Re-post every backlogged message that is no longer in the future
    pub(super) fn process_backlog(&mut self) {
        let mut backlog = std::mem::take(&mut self.backlog);
        let ready = backlog.drain_ready(&self.verifiers, |code, view| self.check_message(code, view));
        self.backlog = backlog;

        for msg in ready {
            self.mux.post(CoreEvent::Backlog(msg));
        }
    }

    /// Sign as ourselves and send to every verifier, including us
    pub(super) fn broadcast(&mut self, mut msg: Message) {
        msg.address = self.address;
        let payload = msg.signing_bytes().and_then(|data| {
            msg.signature = Some(self.backend.sign(&data)?);
            msg.encode()
        });

        match payload {
            Ok(payload) => {
                if let Err(e) = self.backend.broadcast(&self.verifiers, payload) {
                    error!("Failed to broadcast {} message: {}", msg.code, e);
                }
            }
            Err(e) => error!("Failed to finalize {} message: {}", msg.code, e),
        }
    }

    fn gossip(&self, payload: Vec<u8>) {
        if let Err(e) = self.backend.gossip(&self.verifiers, payload) {
            warn!("Failed to gossip message: {}", e);
        }
    }
}

use std::collections::BTreeMap;

use kestrel_core::Address;
use parking_lot::Mutex;

use crate::error::ConsensusError;
use crate::message::Message;
use crate::types::View;
use crate::verifier::VerifierSet;

/// Messages of one kind for one view, at most one per verifier
pub struct MessageSet {
    view: View,
    verifiers: VerifierSet,
    messages: Mutex<BTreeMap<Address, Message>>,
}

impl MessageSet {
    pub fn new(view: View, verifiers: VerifierSet) -> Self {
        MessageSet {
            view,
            verifiers,
            messages: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Record `msg`; a later message from the same sender replaces the earlier one
    pub fn add(&self, msg: Message) -> Result<(), ConsensusError> {
        if !self.verifiers.contains(&msg.address) {
            return Err(ConsensusError::UnauthorizedAddress(msg.address));
        }
        self.messages.lock().insert(msg.address, msg);
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<Message> {
        self.messages.lock().get(address).cloned()
    }

    pub fn values(&self) -> Vec<Message> {
        self.messages.lock().values().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.messages.lock().len()
    }
}

impl std::fmt::Debug for MessageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let senders: Vec<Address> = self.messages.lock().keys().copied().collect();
        f.debug_struct("MessageSet")
            .field("view", &self.view)
            .field("senders", &senders)
            .finish()
    }
}

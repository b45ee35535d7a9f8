use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::message::Message;
use crate::types::{Proposal, View};

/// Inputs to the consensus event loop
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// Proposal from block production
    Request(Proposal),
    /// Encoded message from the network or our own broadcast
    Message(Vec<u8>),
    /// Already-validated message released from the backlog
    Backlog(Message),
    /// Round-change timer armed at this view expired
    Timeout(View),
    /// A new block was committed to the chain
    FinalCommitted,
}

/// Delivery point for [`CoreEvent`]s.
///
/// Posting while no event loop is subscribed drops the event, so timers and
/// network handlers never need to know whether the engine is running.
#[derive(Debug, Default)]
pub struct EventMux {
    sender: RwLock<Option<UnboundedSender<CoreEvent>>>,
}

impl EventMux {
    pub fn new() -> Self {
        EventMux::default()
    }

    /// Replace any previous subscriber and return the new event stream
    pub fn subscribe(&self) -> UnboundedReceiver<CoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.write() = Some(tx);
        rx
    }

    /// Close the current stream; its receiver yields `None` once drained
    pub fn unsubscribe(&self) {
        self.sender.write().take();
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Returns false if the event was dropped
    pub fn post(&self, event: CoreEvent) -> bool {
        match self.sender.read().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_requires_subscriber() {
        let mux = EventMux::new();
        assert!(!mux.post(CoreEvent::FinalCommitted));

        let mut rx = mux.subscribe();
        assert!(mux.post(CoreEvent::FinalCommitted));
        assert!(matches!(rx.recv().await, Some(CoreEvent::FinalCommitted)));

        mux.unsubscribe();
        assert!(!mux.post(CoreEvent::FinalCommitted));
        assert!(rx.recv().await.is_none());
    }
}

use std::collections::BTreeMap;

use tracing::trace;

use super::context::ConsensusContext;
use crate::backend::Backend;
use crate::error::ConsensusError;
use crate::events::CoreEvent;
use crate::types::{Request, State};

/// Requests for sequences we have not reached yet, in height order
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    queue: BTreeMap<(u64, u64), Request>,
    arrivals: u64,
}

impl PendingRequests {
    pub(crate) fn store(&mut self, request: Request) {
        self.queue
            .insert((request.proposal.height(), self.arrivals), request);
        self.arrivals += 1;
    }

    /// Requests for `sequence`; older ones are discarded, later ones kept
    pub(crate) fn take_ready(&mut self, sequence: u64) -> Vec<Request> {
        let mut ready = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let height = entry.key().0;
            if height > sequence {
                break;
            }
            let request = entry.remove();
            if height == sequence {
                ready.push(request);
            }
        }
        ready
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<B: Backend> ConsensusContext<B> {
    pub(super) fn handle_request(&mut self, request: Request) -> Result<(), ConsensusError> {
        let height = request.proposal.height();
        let sequence = self.current.sequence();

        if height < sequence {
            return Err(ConsensusError::OldMessage);
        }
        if height > sequence {
            self.pending_requests.store(request);
            return Err(ConsensusError::FutureMessage);
        }

        self.current.set_pending_request(request.clone());
        if self.state == State::AcceptRequest {
            self.send_preprepare(&request);
        }
        Ok(())
    }

    pub(super) fn process_pending_requests(&mut self) {
        for request in self.pending_requests.take_ready(self.current.sequence()) {
            trace!("Replaying pending request for height {}", request.proposal.height());
            self.mux.post(CoreEvent::Request(request.proposal));
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use kestrel_core::{Address, Hash};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::request::PendingRequests;
use crate::backend::Backend;
use crate::backlog::Backlog;
use crate::config::BftConfig;
use crate::events::{CoreEvent, EventMux};
use crate::message::Message;
use crate::round_change::RoundChangeSet;
use crate::round_state::RoundState;
use crate::types::{Request, State, View};
use crate::verifier::VerifierSet;

/// State owned by the consensus task.
///
/// Nothing here is shared; the backend and the event mux are the only
/// handles to the outside world.
pub struct ConsensusContext<B: Backend> {
    pub(super) config: BftConfig,
    pub(super) address: Address,
    pub(super) backend: Arc<B>,
    pub(super) mux: Arc<EventMux>,

    pub(super) state: State,
    pub(super) verifiers: VerifierSet,
    pub(super) current: RoundState,
    pub(super) round_change_set: RoundChangeSet,
    pub(super) waiting_for_round_change: bool,

    pub(super) backlog: Backlog,
    pub(super) pending_requests: PendingRequests,

    round_change_timer: Option<JoinHandle<()>>,
    future_preprepare_timer: Option<JoinHandle<()>>,
}

impl<B: Backend> ConsensusContext<B> {
    pub fn new(config: BftConfig, backend: Arc<B>, mux: Arc<EventMux>) -> Self {
        let verifiers = VerifierSet::new(Vec::new(), config.proposer_policy);
        ConsensusContext {
            address: backend.address(),
            current: RoundState::new(View::default(), verifiers.clone(), None, None, None),
            round_change_set: RoundChangeSet::new(verifiers.clone()),
            verifiers,
            config,
            backend,
            mux,
            state: State::AcceptRequest,
            waiting_for_round_change: false,
            backlog: Backlog::new(),
            pending_requests: PendingRequests::default(),
            round_change_timer: None,
            future_preprepare_timer: None,
        }
    }

    /// Enter the first round, then process events until the stream closes
    pub async fn run(mut self, mut events: UnboundedReceiver<CoreEvent>) {
        self.start_new_round(0);
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        self.stop_timers();
        debug!("Consensus event loop exited at {}", self.current.view());
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn view(&self) -> View {
        self.current.view()
    }

    pub fn round_state(&self) -> &RoundState {
        &self.current
    }

    pub fn verifiers(&self) -> &VerifierSet {
        &self.verifiers
    }

    pub fn is_waiting_for_round_change(&self) -> bool {
        self.waiting_for_round_change
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_proposer(&self) -> bool {
        self.verifiers.is_proposer(&self.address)
    }

    /// Locked onto a proposal the backend has not flagged as bad
    pub(super) fn is_hash_locked(&self) -> bool {
        self.current
            .locked_hash()
            .is_some_and(|hash| !self.backend.has_bad_proposal(&hash))
    }

    pub(super) fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("State {} -> {} at {}", self.state, state, self.current.view());
            self.state = state;
        }
        if state == State::AcceptRequest {
            self.process_pending_requests();
        }
        self.process_backlog();
    }

    /// Move to the next sequence after a commit (`round` 0), or to `round`
    /// of the current sequence after a round change.
    pub fn start_new_round(&mut self, round: u64) {
        let Some((last_proposal, last_proposer)) = self.backend.last_proposal() else {
            warn!("No committed proposal to build on");
            return;
        };

        let last_height = last_proposal.height();
        let current_sequence = self.current.sequence();
        let mut round_changed = false;

        if last_height >= current_sequence {
            debug!("Catching up to latest proposal at height {}", last_height);
        } else if last_height + 1 == current_sequence {
            if round == 0 {
                return;
            }
            if round < self.current.round() {
                warn!(
                    "New round {} is behind current round {}",
                    round,
                    self.current.round()
                );
                return;
            }
            round_changed = true;
        } else {
            warn!(
                "Latest proposal height {} is behind current sequence {}",
                last_height, current_sequence
            );
            return;
        }

        let view = if round_changed {
            View::new(current_sequence, round)
        } else {
            self.verifiers = self.backend.verifiers(&last_proposal);
            View::new(last_height + 1, 0)
        };

        self.round_change_set = RoundChangeSet::new(self.verifiers.clone());
        self.update_round_state(view, round_changed);
        self.verifiers.calc_proposer(&last_proposer, view.round);
        self.waiting_for_round_change = false;
        self.set_state(State::AcceptRequest);

        if round_changed && self.is_proposer() {
            let request = if self.is_hash_locked() {
                self.current.proposal().map(|proposal| Request {
                    proposal: proposal.clone(),
                })
            } else {
                self.current.pending_request().cloned()
            };
            if let Some(request) = request {
                self.send_preprepare(&request);
            }
        }
        self.new_round_change_timer();

        info!(
            "New round {} proposer {} verifiers {} (we are {})",
            view,
            self.verifiers
                .get_proposer()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            self.verifiers.size(),
            if self.is_proposer() { "proposer" } else { "verifier" }
        );
    }

    /// Enter `view` without a quorum, waiting for one to form
    pub(super) fn catch_up_round(&mut self, view: View) {
        debug!("Catching up to round {}", view);
        self.waiting_for_round_change = true;
        self.update_round_state(view, true);
        self.round_change_set.clear(view.round);
        self.new_round_change_timer();
    }

    /// A round change within the sequence carries the lock, its proposal and
    /// the pending request; a new sequence starts clean.
    fn update_round_state(&mut self, view: View, round_changed: bool) {
        let (preprepare, locked_hash, pending): (_, Option<Hash>, _) = if round_changed {
            let pending = self.current.pending_request().cloned();
            if self.is_hash_locked() {
                (
                    self.current.preprepare().cloned(),
                    self.current.locked_hash(),
                    pending,
                )
            } else {
                (None, None, pending)
            }
        } else {
            (None, None, None)
        };

        self.current = RoundState::new(
            view,
            self.verifiers.clone(),
            preprepare,
            locked_hash,
            pending,
        );
    }

    pub(super) fn new_round_change_timer(&mut self) {
        if let Some(timer) = self.round_change_timer.take() {
            timer.abort();
        }

        let view = self.current.view();
        let timeout = self.config.round_timeout(view.round);
        let mux = self.mux.clone();
        self.round_change_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            mux.post(CoreEvent::Timeout(view));
        }));
    }

    /// Re-deliver a proposal whose timestamp is not yet reached
    pub(super) fn schedule_future_preprepare(&mut self, delay: Duration, msg: Message) {
        if let Some(timer) = self.future_preprepare_timer.take() {
            timer.abort();
        }

        let mux = self.mux.clone();
        self.future_preprepare_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mux.post(CoreEvent::Backlog(msg));
        }));
    }

    fn stop_timers(&mut self) {
        for timer in [self.round_change_timer.take(), self.future_preprepare_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

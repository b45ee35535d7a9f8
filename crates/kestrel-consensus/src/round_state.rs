use kestrel_core::Hash;

use crate::message_set::MessageSet;
use crate::types::{Preprepare, Proposal, Request, Subject, View};
use crate::verifier::VerifierSet;

/// Everything tracked for the current (sequence, round)
#[derive(Debug)]
pub struct RoundState {
    view: View,
    preprepare: Option<Preprepare>,
    prepares: MessageSet,
    commits: MessageSet,
    locked_hash: Option<Hash>,
    pending_request: Option<Request>,
}

impl RoundState {
    pub fn new(
        view: View,
        verifiers: VerifierSet,
        preprepare: Option<Preprepare>,
        locked_hash: Option<Hash>,
        pending_request: Option<Request>,
    ) -> Self {
        RoundState {
            view,
            preprepare,
            prepares: MessageSet::new(view, verifiers.clone()),
            commits: MessageSet::new(view, verifiers),
            locked_hash,
            pending_request,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn sequence(&self) -> u64 {
        self.view.sequence
    }

    pub fn round(&self) -> u64 {
        self.view.round
    }

    /// Current view paired with the accepted proposal's digest
    pub fn subject(&self) -> Option<Subject> {
        self.preprepare.as_ref().map(|pp| Subject {
            view: self.view,
            digest: pp.proposal.hash(),
        })
    }

    pub fn set_preprepare(&mut self, preprepare: Preprepare) {
        self.preprepare = Some(preprepare);
    }

    pub fn preprepare(&self) -> Option<&Preprepare> {
        self.preprepare.as_ref()
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        self.preprepare.as_ref().map(|pp| &pp.proposal)
    }

    pub fn prepares(&self) -> &MessageSet {
        &self.prepares
    }

    pub fn commits(&self) -> &MessageSet {
        &self.commits
    }

    /// Lock onto the current proposal; no-op without one
    pub fn lock_hash(&mut self) {
        if let Some(proposal) = self.proposal() {
            self.locked_hash = Some(proposal.hash());
        }
    }

    pub fn unlock_hash(&mut self) {
        self.locked_hash = None;
    }

    pub fn locked_hash(&self) -> Option<Hash> {
        self.locked_hash
    }

    pub fn pending_request(&self) -> Option<&Request> {
        self.pending_request.as_ref()
    }

    pub fn set_pending_request(&mut self, request: Request) {
        self.pending_request = Some(request);
    }

    /// PREPAREs plus COMMITs from senders with no PREPARE recorded
    pub fn prepare_or_commit_size(&self) -> usize {
        let extra_commits = self
            .commits
            .values()
            .iter()
            .filter(|commit| self.prepares.get(&commit.address).is_none())
            .count();
        self.prepares.size() + extra_commits
    }
}

use kestrel_core::{Address, Hash, Seal};

use crate::error::{ConsensusError, ProposalError};
use crate::types::Proposal;
use crate::verifier::VerifierSet;

/// What the consensus core needs from the chain and the network.
///
/// Implementations must not block: every method is called from the single
/// consensus task.
pub trait Backend: Send + Sync + 'static {
    /// Local verifier address
    fn address(&self) -> Address;

    /// Verifiers that decide the block following `proposal`
    fn verifiers(&self, proposal: &Proposal) -> VerifierSet;

    /// Verifiers that decided `proposal` itself
    fn parent_verifiers(&self, proposal: &Proposal) -> VerifierSet;

    /// Validate a proposal received in a PRE-PREPARE
    fn verify(&self, proposal: &Proposal) -> Result<(), ProposalError>;

    /// Persist `proposal` with the quorum's commit seals
    fn commit(&self, proposal: &Proposal, committed_seals: Vec<Seal>) -> Result<(), ConsensusError>;

    /// Send to every verifier, including ourselves
    fn broadcast(&self, verifiers: &VerifierSet, payload: Vec<u8>) -> Result<(), ConsensusError>;

    /// Send to every verifier except ourselves
    fn gossip(&self, verifiers: &VerifierSet, payload: Vec<u8>) -> Result<(), ConsensusError>;

    fn sign(&self, data: &[u8]) -> Result<Seal, ConsensusError>;

    /// Ok if `seal` is a valid signature by `address` over `data`
    fn check_signature(&self, data: &[u8], address: &Address, seal: &Seal) -> Result<(), ConsensusError>;

    /// Head of the chain and the address that proposed it (zero for genesis)
    fn last_proposal(&self) -> Option<(Proposal, Address)>;

    fn has_proposal(&self, hash: &Hash) -> bool;

    /// Proposer of the committed block at `height`
    fn get_proposer(&self, height: u64) -> Address;

    fn has_bad_proposal(&self, hash: &Hash) -> bool;
}

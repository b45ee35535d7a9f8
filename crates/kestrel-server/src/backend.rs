use kestrel_consensus::{
    Backend, ConsensusError, CoreEvent, Proposal, ProposalError, VerifierSet,
};
use kestrel_core::{hash_blake3, Address, Hash, Seal};
use kestrel_state::Storage;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::server::Server;

impl ServerError {
    /// Failures intrinsic to the block, as opposed to our view of the chain
    fn is_bad_block(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidTimestamp
                | ServerError::InvalidTxRoot
                | ServerError::InvalidExtra(_)
                | ServerError::InvalidVote
                | ServerError::Unauthorized(_)
                | ServerError::InvalidCommittedSeals
                | ServerError::Core(_)
        )
    }
}

impl<S: Storage + 'static> Backend for Server<S> {
    fn address(&self) -> Address {
        self.address
    }

    fn verifiers(&self, proposal: &Proposal) -> VerifierSet {
        self.verifier_set(proposal.height(), proposal.hash())
    }

    fn parent_verifiers(&self, proposal: &Proposal) -> VerifierSet {
        let block = proposal.as_block();
        match block.height() {
            0 => self.verifier_set(0, block.hash()),
            h => self.verifier_set(h - 1, block.header.prev_hash),
        }
    }

    fn verify(&self, proposal: &Proposal) -> Result<(), ProposalError> {
        let block = proposal.as_block();
        let hash = block.hash();
        if self.has_bad_proposal(&hash) {
            return Err(ProposalError::Invalid(format!("known bad proposal {}", hash.short())));
        }

        let result = if block.verify_tx_root() {
            self.verify_header(&block.header)
        } else {
            Err(ServerError::InvalidTxRoot)
        };

        match result {
            // Seals are only attached at commit
            Ok(()) | Err(ServerError::EmptyCommittedSeals) => Ok(()),
            Err(ServerError::FutureBlock(delay)) => Err(ProposalError::Future(delay)),
            Err(e) => {
                if e.is_bad_block() {
                    self.bad_proposals.write().insert(hash);
                }
                Err(ProposalError::Invalid(e.to_string()))
            }
        }
    }

    fn commit(&self, proposal: &Proposal, committed_seals: Vec<Seal>) -> Result<(), ConsensusError> {
        let mut block = proposal.as_block().clone();
        block.header.extra.committed_seals = committed_seals;

        self.verify_header(&block.header)
            .map_err(|e| ConsensusError::Backend(e.to_string()))?;

        let (height, hash, seals) = (block.height(), block.hash(), block.header.extra.committed_seals.len());
        self.chain
            .write()
            .insert_block(block)
            .map_err(|e| ConsensusError::Backend(e.to_string()))?;

        info!(
            "Committed block {} at height {} with {} seals",
            hash.short(),
            height,
            seals
        );
        self.mux.post(CoreEvent::FinalCommitted);
        Ok(())
    }

    fn broadcast(&self, verifiers: &VerifierSet, payload: Vec<u8>) -> Result<(), ConsensusError> {
        self.gossip(verifiers, payload.clone())?;
        self.mux.post(CoreEvent::Message(payload));
        Ok(())
    }

    fn gossip(&self, verifiers: &VerifierSet, payload: Vec<u8>) -> Result<(), ConsensusError> {
        let hash = hash_blake3(&payload);
        self.known_messages.lock().put(hash, ());
        if self.gossiped.lock().put(hash, ()).is_some() {
            return Ok(());
        }

        let targets: Vec<Address> = verifiers
            .list()
            .iter()
            .filter(|a| **a != self.address)
            .copied()
            .collect();
        if !targets.is_empty() {
            self.transport.send(&targets, payload);
        }
        Ok(())
    }

    fn sign(&self, data: &[u8]) -> Result<Seal, ConsensusError> {
        Ok(Seal::sign(&self.keypair.secret, data))
    }

    fn check_signature(&self, data: &[u8], address: &Address, seal: &Seal) -> Result<(), ConsensusError> {
        let signer = seal.recover(data)?;
        if signer != *address {
            return Err(ConsensusError::UnauthorizedAddress(*address));
        }
        Ok(())
    }

    fn last_proposal(&self) -> Option<(Proposal, Address)> {
        let chain = self.chain.read();
        let head = chain.head()?;
        let proposer = if head.height() == 0 {
            Address::ZERO
        } else {
            match head.header.signer() {
                Ok(signer) => signer,
                Err(e) => {
                    warn!("Head block {} has no valid seal: {}", head.hash().short(), e);
                    Address::ZERO
                }
            }
        };
        Some((Proposal::Block(head.clone()), proposer))
    }

    fn has_proposal(&self, hash: &Hash) -> bool {
        self.chain.read().has_block(hash)
    }

    fn get_proposer(&self, height: u64) -> Address {
        self.chain
            .read()
            .header_by_height(height)
            .filter(|h| h.height > 0)
            .and_then(|h| h.signer().ok())
            .unwrap_or(Address::ZERO)
    }

    fn has_bad_proposal(&self, hash: &Hash) -> bool {
        self.bad_proposals.read().contains(hash)
    }
}

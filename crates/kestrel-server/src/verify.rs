//! Header verification against the parent snapshot.

use kestrel_consensus::{committed_seal_data, VerifierSet};
use kestrel_core::BlockHeader;
use kestrel_state::Storage;

use crate::error::ServerError;
use crate::server::{unix_now, until, Server};

impl<S: Storage + 'static> Server<S> {
    /// Check a header against the chain it extends.
    ///
    /// Committed seals are checked last, so `EmptyCommittedSeals` means every
    /// other rule passed.
    pub fn verify_header(&self, header: &BlockHeader) -> Result<(), ServerError> {
        header
            .extra
            .check_version()
            .map_err(|_| ServerError::InvalidExtra("unsupported version"))?;

        if header.timestamp > unix_now() {
            return Err(ServerError::FutureBlock(until(header.timestamp)));
        }

        if header.height == 0 {
            return Ok(());
        }

        let parent_time = {
            let chain = self.chain.read();
            let parent = chain
                .header_by_hash(&header.prev_hash)
                .filter(|p| p.height + 1 == header.height)
                .ok_or(ServerError::UnknownParent(header.prev_hash))?;
            parent.timestamp
        };
        if parent_time + self.config.block_period_secs > header.timestamp {
            return Err(ServerError::InvalidTimestamp);
        }

        if header.creator.is_zero() && header.vote.is_authorize() {
            return Err(ServerError::InvalidVote);
        }

        let snap = self.snapshot(header.height - 1, header.prev_hash)?;
        let signer = header.signer()?;
        if !snap.verifiers.contains(&signer) {
            return Err(ServerError::Unauthorized(signer));
        }

        verify_committed_seals(header, &snap.verifiers)
    }
}

/// Every committed seal must come from a distinct member of `verifiers`,
/// and there must be a quorum of them.
pub fn verify_committed_seals(header: &BlockHeader, verifiers: &VerifierSet) -> Result<(), ServerError> {
    let seals = &header.extra.committed_seals;
    if seals.is_empty() {
        return Err(ServerError::EmptyCommittedSeals);
    }

    let data = committed_seal_data(&header.hash());
    let mut remaining = verifiers.clone();
    for seal in seals {
        let signer = seal
            .recover(&data)
            .map_err(|_| ServerError::InvalidCommittedSeals)?;
        if !remaining.remove(&signer) {
            return Err(ServerError::InvalidCommittedSeals);
        }
    }

    if seals.len() < verifiers.quorum() {
        return Err(ServerError::InvalidCommittedSeals);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_consensus::ProposerPolicy;
    use kestrel_core::{Address, BftExtra, Hash, KeyPair, Seal, VoteFlag};

    fn setup(n: usize) -> (Vec<KeyPair>, VerifierSet, BlockHeader) {
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        let set = VerifierSet::new(keys.iter().map(|k| k.address()).collect(), ProposerPolicy::RoundRobin);
        let mut header = BlockHeader {
            chain_id: 1,
            height: 1,
            prev_hash: Hash::ZERO,
            timestamp: 1,
            tx_root: Hash::ZERO,
            creator: Address::ZERO,
            vote: VoteFlag::Drop,
            extra: BftExtra::new(set.list().to_vec()),
        };
        header.seal(&keys[0].secret);
        (keys, set, header)
    }

    fn committed_seal(key: &KeyPair, header: &BlockHeader) -> Seal {
        Seal::sign(&key.secret, &committed_seal_data(&header.hash()))
    }

    #[test]
    fn test_quorum_of_seals_accepted() {
        let (keys, set, mut header) = setup(4);
        header.extra.committed_seals = keys[..3].iter().map(|k| committed_seal(k, &header)).collect();
        assert!(verify_committed_seals(&header, &set).is_ok());
    }

    #[test]
    fn test_empty_seals_reported() {
        let (_, set, header) = setup(4);
        assert!(matches!(
            verify_committed_seals(&header, &set),
            Err(ServerError::EmptyCommittedSeals)
        ));
    }

    #[test]
    fn test_too_few_seals_rejected() {
        let (keys, set, mut header) = setup(4);
        header.extra.committed_seals = keys[..2].iter().map(|k| committed_seal(k, &header)).collect();
        assert!(matches!(
            verify_committed_seals(&header, &set),
            Err(ServerError::InvalidCommittedSeals)
        ));
    }

    #[test]
    fn test_duplicate_seal_rejected() {
        let (keys, set, mut header) = setup(4);
        let seal = committed_seal(&keys[1], &header);
        header.extra.committed_seals = vec![committed_seal(&keys[0], &header), seal, seal];
        assert!(matches!(
            verify_committed_seals(&header, &set),
            Err(ServerError::InvalidCommittedSeals)
        ));
    }

    #[test]
    fn test_outsider_seal_rejected() {
        let (keys, set, mut header) = setup(4);
        let outsider = KeyPair::generate();
        header.extra.committed_seals = vec![
            committed_seal(&keys[0], &header),
            committed_seal(&keys[1], &header),
            committed_seal(&outsider, &header),
        ];
        assert!(matches!(
            verify_committed_seals(&header, &set),
            Err(ServerError::InvalidCommittedSeals)
        ));
    }

    #[test]
    fn test_seal_over_other_digest_rejected() {
        let (keys, set, mut header) = setup(1);
        header.extra.committed_seals = vec![Seal::sign(&keys[0].secret, &committed_seal_data(&Hash([7u8; 32])))];
        assert!(matches!(
            verify_committed_seals(&header, &set),
            Err(ServerError::InvalidCommittedSeals)
        ));
    }
}

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_blake3, merkle_root, Address, Hash, SecretKey, Seal};
use crate::error::CoreError;
use crate::types::extra::BftExtra;

/// Direction of the membership vote a header carries for its `creator`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VoteFlag {
    Authorize,
    #[default]
    Drop,
}

impl VoteFlag {
    pub fn is_authorize(&self) -> bool {
        matches!(self, VoteFlag::Authorize)
    }

    fn tag(&self) -> u8 {
        match self {
            VoteFlag::Authorize => 1,
            VoteFlag::Drop => 0,
        }
    }
}

/// Block header containing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: u64,
    /// Block height (0 for genesis)
    pub height: u64,
    /// Hash of the previous block (zeros for genesis)
    pub prev_hash: Hash,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    /// Merkle root of transactions
    pub tx_root: Hash,
    /// Vote target; zero when the header carries no vote
    pub creator: Address,
    pub vote: VoteFlag,
    pub extra: BftExtra,
}

impl BlockHeader {
    /// Block identity. Committed seals are excluded so every verifier
    /// computes the same hash before and after commit.
    pub fn hash(&self) -> Hash {
        self.digest(true)
    }

    /// Hash the proposer signs; excludes the proposer seal and committed seals
    pub fn seal_hash(&self) -> Hash {
        self.digest(false)
    }

    fn digest(&self, keep_seal: bool) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.chain_id.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.prev_hash.0);
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.tx_root.0);
        hasher.update(&self.creator.0);
        hasher.update(&[self.vote.tag()]);

        hasher.update(&[self.extra.version]);
        hasher.update(&self.extra.vanity);
        hasher.update(&(self.extra.verifiers.len() as u64).to_le_bytes());
        for verifier in &self.extra.verifiers {
            hasher.update(&verifier.0);
        }
        if keep_seal {
            if let Some(seal) = &self.extra.seal {
                hasher.update(&seal.public_key.0);
                hasher.update(&seal.signature.0);
            }
        }

        Hash(*hasher.finalize().as_bytes())
    }

    /// Sign the seal hash and store the seal in the extra region
    pub fn seal(&mut self, secret_key: &SecretKey) {
        let seal = Seal::sign(secret_key, self.seal_hash().as_bytes());
        self.extra.seal = Some(seal);
    }

    /// Address of the proposer that sealed this header
    pub fn signer(&self) -> Result<Address, CoreError> {
        let seal = self.extra.seal.as_ref().ok_or(CoreError::InvalidSignature)?;
        seal.recover(self.seal_hash().as_bytes())
    }
}

/// A complete block. Transactions are opaque payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Vec<u8>>,
}

impl Block {
    pub fn new(header: BlockHeader, txs: Vec<Vec<u8>>) -> Self {
        Block { header, txs }
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn compute_tx_root(&self) -> Hash {
        let tx_hashes: Vec<Hash> = self.txs.iter().map(|tx| hash_blake3(tx)).collect();
        merkle_root(&tx_hashes)
    }

    pub fn verify_tx_root(&self) -> bool {
        self.compute_tx_root() == self.header.tx_root
    }
}

/// Genesis block configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub chain_id: u64,
    pub timestamp: u64,
    pub verifiers: Vec<Address>,
}

impl GenesisConfig {
    /// Genesis carries the initial verifier list, sorted ascending
    pub fn create_genesis_block(&self) -> Block {
        let mut verifiers = self.verifiers.clone();
        verifiers.sort();
        verifiers.dedup();

        let header = BlockHeader {
            chain_id: self.chain_id,
            height: 0,
            prev_hash: Hash::ZERO,
            timestamp: self.timestamp,
            tx_root: Hash::ZERO,
            creator: Address::ZERO,
            vote: VoteFlag::Drop,
            extra: BftExtra::new(verifiers),
        };

        Block::new(header, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn test_header(height: u64) -> BlockHeader {
        BlockHeader {
            chain_id: 9,
            height,
            prev_hash: hash_blake3(b"parent"),
            timestamp: 1_700_000_000,
            tx_root: Hash::ZERO,
            creator: Address::ZERO,
            vote: VoteFlag::Drop,
            extra: BftExtra::default(),
        }
    }

    #[test]
    fn test_hash_ignores_committed_seals() {
        let kp = KeyPair::generate();
        let mut header = test_header(5);
        header.seal(&kp.secret);
        let before = header.hash();

        header.extra.committed_seals.push(Seal::sign(&kp.secret, b"commit"));
        assert_eq!(header.hash(), before);
    }

    #[test]
    fn test_seal_hash_ignores_proposer_seal() {
        let kp = KeyPair::generate();
        let mut header = test_header(5);
        let unsealed_hash = header.hash();
        let seal_hash = header.seal_hash();

        header.seal(&kp.secret);
        assert_eq!(header.seal_hash(), seal_hash);
        assert_ne!(header.hash(), unsealed_hash);
    }

    #[test]
    fn test_signer_recovered() {
        let kp = KeyPair::generate();
        let mut header = test_header(1);
        assert!(header.signer().is_err());

        header.seal(&kp.secret);
        assert_eq!(header.signer().unwrap(), kp.address());

        header.timestamp += 1;
        assert!(header.signer().is_err());
    }

    #[test]
    fn test_vote_changes_hash() {
        let mut header = test_header(3);
        header.creator = Address([4u8; 20]);
        let drop_hash = header.hash();
        header.vote = VoteFlag::Authorize;
        assert_ne!(header.hash(), drop_hash);
    }

    #[test]
    fn test_tx_root() {
        let txs = vec![b"a".to_vec(), b"b".to_vec()];
        let mut header = test_header(2);
        header.tx_root = merkle_root(&[hash_blake3(b"a"), hash_blake3(b"b")]);
        let block = Block::new(header, txs);
        assert!(block.verify_tx_root());
    }

    #[test]
    fn test_genesis_sorts_verifiers() {
        let genesis = GenesisConfig {
            chain_id: 1,
            timestamp: 0,
            verifiers: vec![Address([3u8; 20]), Address([1u8; 20]), Address([3u8; 20])],
        }
        .create_genesis_block();

        assert_eq!(genesis.height(), 0);
        assert_eq!(
            genesis.header.extra.verifiers,
            vec![Address([1u8; 20]), Address([3u8; 20])]
        );
    }
}

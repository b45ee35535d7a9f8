use std::collections::{BTreeMap, HashMap};

use kestrel_core::{serialize, Block, BlockHeader, GenesisConfig, Hash};
use tracing::{debug, info};

use crate::error::StateError;
use crate::storage::Storage;

/// Key prefixes for storage
mod keys {
    pub const BLOCK: &[u8] = b"blk:";
}

fn block_key(height: u64) -> Vec<u8> {
    // Big-endian so prefix scans come back in height order
    [keys::BLOCK, &height.to_be_bytes()[..]].concat()
}

/// Canonical chain of committed blocks
pub struct ChainStore<S: Storage> {
    storage: S,
    blocks: BTreeMap<u64, Block>,
    by_hash: HashMap<Hash, u64>,
}

impl<S: Storage> ChainStore<S> {
    pub fn new(storage: S) -> Self {
        ChainStore {
            storage,
            blocks: BTreeMap::new(),
            by_hash: HashMap::new(),
        }
    }

    /// Write the genesis block; a no-op if one is already present
    pub fn init_genesis(&mut self, config: &GenesisConfig) -> Result<Hash, StateError> {
        if let Some(genesis) = self.blocks.get(&0) {
            return Ok(genesis.hash());
        }

        let genesis = config.create_genesis_block();
        let hash = genesis.hash();
        info!(
            "Initialized genesis {} with {} verifiers",
            hash.short(),
            genesis.header.extra.verifiers.len()
        );
        self.persist_block(genesis)?;
        Ok(hash)
    }

    /// Rebuild the in-memory index from storage
    pub fn load_from_storage(&mut self) -> Result<(), StateError> {
        self.blocks.clear();
        self.by_hash.clear();

        for key in self.storage.keys_with_prefix(keys::BLOCK) {
            if let Some(value) = self.storage.get(&key) {
                let block: Block = serialize::from_bytes(&value)
                    .map_err(|e| StateError::Serialization(e.to_string()))?;
                self.index(block);
            }
        }

        info!("Loaded {} blocks from storage", self.blocks.len());
        Ok(())
    }

    /// Append a block on top of the current head
    pub fn insert_block(&mut self, block: Block) -> Result<(), StateError> {
        let head = self.head().ok_or(StateError::NoGenesis)?;
        let expected = head.height() + 1;

        if block.height() < expected {
            return Err(StateError::BlockExists(block.height()));
        }
        if block.height() > expected {
            return Err(StateError::NonContiguous {
                height: block.height(),
                expected,
            });
        }
        if block.header.prev_hash != head.hash() {
            return Err(StateError::UnknownParent(block.header.prev_hash));
        }

        debug!("Storing block {} at height {}", block.hash().short(), block.height());
        self.persist_block(block)
    }

    fn persist_block(&mut self, block: Block) -> Result<(), StateError> {
        let value =
            serialize::to_bytes(&block).map_err(|e| StateError::Serialization(e.to_string()))?;
        self.storage.put(&block_key(block.height()), &value);
        if let Err(e) = self.storage.commit() {
            self.storage.rollback();
            return Err(e);
        }

        self.index(block);
        Ok(())
    }

    fn index(&mut self, block: Block) {
        self.by_hash.insert(block.hash(), block.height());
        self.blocks.insert(block.height(), block);
    }

    pub fn head(&self) -> Option<&Block> {
        self.blocks.values().next_back()
    }

    pub fn height(&self) -> u64 {
        self.head().map(Block::height).unwrap_or(0)
    }

    pub fn genesis(&self) -> Option<&Block> {
        self.blocks.get(&0)
    }

    pub fn block_by_height(&self, height: u64) -> Option<&Block> {
        self.blocks.get(&height)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.by_hash.get(hash).and_then(|h| self.blocks.get(h))
    }

    pub fn header_by_height(&self, height: u64) -> Option<&BlockHeader> {
        self.block_by_height(height).map(|b| &b.header)
    }

    pub fn header_by_hash(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.block_by_hash(hash).map(|b| &b.header)
    }

    pub fn has_block(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kestrel_consensus::{BftConfig, ConsensusError, Core, CoreEvent, EventMux, Proposal, VerifierSet};
use kestrel_core::{hash_blake3, Address, BftExtra, Block, BlockHeader, Hash, KeyPair, VoteFlag};
use kestrel_state::{ChainStore, Storage};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use crate::error::ServerError;
use crate::snapshot::Snapshot;
use crate::transport::Transport;

/// Snapshots are persisted every this many blocks
pub const CHECKPOINT_INTERVAL: u64 = 1024;

const fn capacity(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("zero capacity"),
    }
}

const RECENT_SNAPSHOTS: NonZeroUsize = capacity(128);
const KNOWN_MESSAGES: NonZeroUsize = capacity(1024);

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Delay until the unix second `timestamp`, zero if already passed
pub(crate) fn until(timestamp: u64) -> Duration {
    let target = UNIX_EPOCH + Duration::from_secs(timestamp);
    target
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO)
}

/// The chain-facing half of a verifier node.
///
/// Owns the consensus [`Core`] handle and implements its
/// [`kestrel_consensus::Backend`] over a [`ChainStore`].
pub struct Server<S: Storage> {
    pub(crate) config: BftConfig,
    pub(crate) keypair: KeyPair,
    pub(crate) address: Address,
    pub(crate) chain: Arc<RwLock<ChainStore<S>>>,
    pub(crate) core: Core,
    pub(crate) mux: Arc<EventMux>,
    pub(crate) transport: Arc<dyn Transport>,
    recents: Mutex<LruCache<Hash, Snapshot>>,
    candidates: RwLock<BTreeMap<Address, bool>>,
    /// Payloads received or sent, by hash
    pub(crate) known_messages: Mutex<LruCache<Hash, ()>>,
    /// Payloads already relayed to the other verifiers
    pub(crate) gossiped: Mutex<LruCache<Hash, ()>>,
    pub(crate) bad_proposals: RwLock<HashSet<Hash>>,
}

impl<S: Storage + 'static> Server<S> {
    pub fn new(
        config: BftConfig,
        keypair: KeyPair,
        chain: Arc<RwLock<ChainStore<S>>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mux = Arc::new(EventMux::new());
        Server {
            core: Core::new(config.clone(), mux.clone()),
            address: keypair.address(),
            config,
            keypair,
            chain,
            mux,
            transport,
            recents: Mutex::new(LruCache::new(RECENT_SNAPSHOTS)),
            candidates: RwLock::new(BTreeMap::new()),
            known_messages: Mutex::new(LruCache::new(KNOWN_MESSAGES)),
            gossiped: Mutex::new(LruCache::new(KNOWN_MESSAGES)),
            bad_proposals: RwLock::new(HashSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &BftConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<RwLock<ChainStore<S>>> {
        &self.chain
    }

    /// Start the consensus engine. Must be called within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), ServerError> {
        self.core.start(Arc::clone(self))?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ServerError> {
        self.core.stop().await?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Hand a consensus payload received from the network to the engine.
    /// Payloads seen before are dropped.
    pub fn handle_message(&self, payload: Vec<u8>) -> Result<(), ServerError> {
        if !self.core.is_running() {
            return Err(ConsensusError::EngineStopped.into());
        }

        let hash = hash_blake3(&payload);
        if self.known_messages.lock().put(hash, ()).is_some() {
            trace!("Dropping known message {}", hash.short());
            return Ok(());
        }

        self.mux.post(CoreEvent::Message(payload));
        Ok(())
    }

    /// Submit a proposal for agreement
    pub fn request(&self, proposal: Proposal) -> Result<(), ServerError> {
        if !self.core.is_running() {
            return Err(ConsensusError::EngineStopped.into());
        }
        self.mux.post(CoreEvent::Request(proposal));
        Ok(())
    }

    /// Stage a membership vote to embed in blocks we propose
    pub fn propose(&self, address: Address, authorize: bool) {
        self.candidates.write().insert(address, authorize);
    }

    /// Withdraw a staged vote
    pub fn discard(&self, address: &Address) -> bool {
        self.candidates.write().remove(address).is_some()
    }

    pub fn candidates(&self) -> BTreeMap<Address, bool> {
        self.candidates.read().clone()
    }

    /// Fill in the consensus fields of a header built on the current chain:
    /// the parent snapshot's verifier list, at most one staged vote and the
    /// timestamp.
    pub fn prepare(&self, header: &mut BlockHeader) -> Result<(), ServerError> {
        let parent_time = {
            let chain = self.chain.read();
            let parent = chain
                .header_by_hash(&header.prev_hash)
                .filter(|p| p.height + 1 == header.height)
                .ok_or(ServerError::UnknownParent(header.prev_hash))?;
            parent.timestamp
        };
        let snap = self.snapshot(header.height - 1, header.prev_hash)?;

        header.creator = Address::ZERO;
        header.vote = VoteFlag::Drop;
        let vote = self
            .candidates
            .read()
            .iter()
            .find(|(address, authorize)| snap.check_vote(address, **authorize))
            .map(|(address, authorize)| (*address, *authorize));
        if let Some((address, authorize)) = vote {
            debug!("Embedding vote {} for {}", if authorize { "authorize" } else { "drop" }, address);
            header.creator = address;
            header.vote = if authorize { VoteFlag::Authorize } else { VoteFlag::Drop };
        }

        header.extra = BftExtra::new(snap.verifiers());
        header.timestamp = (parent_time + self.config.block_period_secs).max(unix_now());
        Ok(())
    }

    /// Sign a prepared block. Only members of the parent snapshot may seal.
    pub fn seal(&self, mut block: Block) -> Result<Block, ServerError> {
        let height = block.height();
        if height == 0 {
            return Err(ServerError::UnknownBlock);
        }
        let snap = self.snapshot(height - 1, block.header.prev_hash)?;
        if !snap.verifiers.contains(&self.address) {
            return Err(ServerError::Unauthorized(self.address));
        }

        block.header.seal(&self.keypair.secret);
        Ok(block)
    }

    /// Build, seal and submit a block on top of the head, waiting until its
    /// timestamp is reached.
    pub async fn produce_block(&self, txs: Vec<Vec<u8>>) -> Result<Block, ServerError> {
        let parent = self
            .chain
            .read()
            .head()
            .map(|b| b.header.clone())
            .ok_or(ServerError::UnknownBlock)?;

        let header = BlockHeader {
            chain_id: parent.chain_id,
            height: parent.height + 1,
            prev_hash: parent.hash(),
            timestamp: 0,
            tx_root: Hash::ZERO,
            creator: Address::ZERO,
            vote: VoteFlag::Drop,
            extra: BftExtra::default(),
        };
        let mut block = Block::new(header, txs);
        block.header.tx_root = block.compute_tx_root();

        self.prepare(&mut block.header)?;
        let block = self.seal(block)?;

        let delay = until(block.header.timestamp);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!("Requesting block {} at height {}", block.hash().short(), block.height());
        self.request(Proposal::Block(block.clone()))?;
        Ok(block)
    }

    /// Snapshot after the head, or after the block at `height`
    pub fn get_snapshot(&self, height: Option<u64>) -> Result<Snapshot, ServerError> {
        let (height, hash) = {
            let chain = self.chain.read();
            let header = match height {
                Some(h) => chain.header_by_height(h),
                None => chain.head().map(|b| &b.header),
            }
            .ok_or(ServerError::UnknownBlock)?;
            (header.height, header.hash())
        };
        self.snapshot(height, hash)
    }

    pub fn get_snapshot_at_hash(&self, hash: &Hash) -> Result<Snapshot, ServerError> {
        let height = self
            .chain
            .read()
            .header_by_hash(hash)
            .map(|h| h.height)
            .ok_or(ServerError::UnknownBlock)?;
        self.snapshot(height, *hash)
    }

    pub fn get_verifiers(&self, height: Option<u64>) -> Result<Vec<Address>, ServerError> {
        Ok(self.get_snapshot(height)?.verifiers())
    }

    pub fn get_verifiers_at_hash(&self, hash: &Hash) -> Result<Vec<Address>, ServerError> {
        Ok(self.get_snapshot_at_hash(hash)?.verifiers())
    }

    /// Verifier set in force after block `hash` at `height`; empty if the
    /// block is unknown.
    pub(crate) fn verifier_set(&self, height: u64, hash: Hash) -> VerifierSet {
        match self.snapshot(height, hash) {
            Ok(snap) => snap.verifiers,
            Err(e) => {
                debug!("No snapshot for {} at height {}: {}", hash.short(), height, e);
                VerifierSet::new(Vec::new(), self.config.proposer_policy)
            }
        }
    }

    /// Membership after block `hash` at `height`: the nearest cached or
    /// checkpointed snapshot (or genesis) with later headers replayed.
    pub fn snapshot(&self, height: u64, hash: Hash) -> Result<Snapshot, ServerError> {
        let mut headers: Vec<BlockHeader> = Vec::new();
        let mut genesis = false;
        let (mut number, mut cursor) = (height, hash);

        let base = {
            let chain = self.chain.read();
            loop {
                if let Some(snap) = self.recents.lock().get(&cursor) {
                    break snap.clone();
                }
                if number % CHECKPOINT_INTERVAL == 0 {
                    if let Some(snap) = Snapshot::load(chain.storage(), self.config.epoch, &cursor)? {
                        trace!("Loaded voting snapshot from disk at {}", number);
                        break snap;
                    }
                }
                if number == 0 {
                    let header = chain
                        .header_by_height(0)
                        .filter(|h| h.hash() == cursor)
                        .ok_or(ServerError::UnknownBlock)?;
                    genesis = true;
                    break Snapshot::new(
                        self.config.epoch,
                        0,
                        cursor,
                        VerifierSet::new(header.extra.verifiers.clone(), self.config.proposer_policy),
                    );
                }

                let header = chain
                    .header_by_hash(&cursor)
                    .filter(|h| h.height == number)
                    .ok_or(ServerError::UnknownParent(cursor))?;
                cursor = header.prev_hash;
                number -= 1;
                headers.push(header.clone());
            }
        };

        if genesis {
            base.store(self.chain.write().storage_mut())?;
            info!("Stored genesis voting snapshot to disk");
        }

        headers.reverse();
        let snap = base.apply(&headers)?;
        self.recents.lock().put(snap.hash, snap.clone());

        if !headers.is_empty() && snap.height % CHECKPOINT_INTERVAL == 0 {
            snap.store(self.chain.write().storage_mut())?;
            debug!("Stored voting snapshot to disk at {}", snap.height);
        }
        Ok(snap)
    }
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kestrel_consensus::{
    BftConfig, ConsensusContext, ConsensusError, CoreEvent, EventMux, Message, MessageCode,
    Preprepare, Proposal, ProposalError, ProposerPolicy, Subject, VerifierSet, View,
    committed_seal_data, Backend,
};
use kestrel_core::{
    serialize, Address, BftExtra, Block, BlockHeader, GenesisConfig, Hash, KeyPair, Seal, VoteFlag,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

/// Scripted chain: a fixed verifier set, an in-memory list of committed
/// proposals and a record of everything the engine sent.
pub struct MockBackend {
    pub keypair: KeyPair,
    pub verifiers: Vec<Address>,
    pub mux: Arc<EventMux>,
    pub chain: Mutex<Vec<(Proposal, Address)>>,
    pub committed_seals: Mutex<Vec<Vec<Seal>>>,
    pub broadcasts: Mutex<Vec<Message>>,
    pub gossip_count: Mutex<usize>,
    pub future_delay: Mutex<Option<Duration>>,
    pub fail_commit: Mutex<bool>,
}

impl MockBackend {
    pub fn new(keypair: KeyPair, verifiers: Vec<Address>, mux: Arc<EventMux>) -> Self {
        let genesis = GenesisConfig {
            chain_id: 1,
            timestamp: 1_700_000_000,
            verifiers: verifiers.clone(),
        }
        .create_genesis_block();

        MockBackend {
            keypair,
            verifiers,
            mux,
            chain: Mutex::new(vec![(Proposal::Block(genesis), Address::ZERO)]),
            committed_seals: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            gossip_count: Mutex::new(0),
            future_delay: Mutex::new(None),
            fail_commit: Mutex::new(false),
        }
    }

    pub fn head(&self) -> Proposal {
        self.chain.lock().last().map(|(p, _)| p.clone()).unwrap()
    }

    pub fn height(&self) -> u64 {
        self.head().height()
    }

    pub fn sent(&self, code: MessageCode) -> Vec<Message> {
        self.broadcasts
            .lock()
            .iter()
            .filter(|m| m.code == code)
            .cloned()
            .collect()
    }
}

impl Backend for MockBackend {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    fn verifiers(&self, _proposal: &Proposal) -> VerifierSet {
        VerifierSet::new(self.verifiers.clone(), ProposerPolicy::RoundRobin)
    }

    fn parent_verifiers(&self, _proposal: &Proposal) -> VerifierSet {
        VerifierSet::new(self.verifiers.clone(), ProposerPolicy::RoundRobin)
    }

    fn verify(&self, _proposal: &Proposal) -> Result<(), ProposalError> {
        match *self.future_delay.lock() {
            Some(delay) => Err(ProposalError::Future(delay)),
            None => Ok(()),
        }
    }

    fn commit(&self, proposal: &Proposal, committed_seals: Vec<Seal>) -> Result<(), ConsensusError> {
        if *self.fail_commit.lock() {
            return Err(ConsensusError::Backend("insert failed".to_string()));
        }
        let proposer = proposal.as_block().header.signer().unwrap_or(Address::ZERO);
        self.chain.lock().push((proposal.clone(), proposer));
        self.committed_seals.lock().push(committed_seals);
        self.mux.post(CoreEvent::FinalCommitted);
        Ok(())
    }

    fn broadcast(&self, _verifiers: &VerifierSet, payload: Vec<u8>) -> Result<(), ConsensusError> {
        self.broadcasts.lock().push(Message::decode(&payload)?);
        self.mux.post(CoreEvent::Message(payload));
        Ok(())
    }

    fn gossip(&self, _verifiers: &VerifierSet, _payload: Vec<u8>) -> Result<(), ConsensusError> {
        *self.gossip_count.lock() += 1;
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
        self.chain.lock().last().cloned()
    }

    fn has_proposal(&self, hash: &Hash) -> bool {
        self.chain.lock().iter().any(|(p, _)| p.hash() == *hash)
    }

    fn get_proposer(&self, height: u64) -> Address {
        self.chain
            .lock()
            .iter()
            .find(|(p, _)| p.height() == height)
            .map(|(_, proposer)| *proposer)
            .unwrap_or(Address::ZERO)
    }

    fn has_bad_proposal(&self, _hash: &Hash) -> bool {
        false
    }
}

/// Four verifiers sorted by address; one of them is the local node
pub struct Harness {
    pub keys: Vec<KeyPair>,
    pub backend: Arc<MockBackend>,
    pub ctx: ConsensusContext<MockBackend>,
    pub events: UnboundedReceiver<CoreEvent>,
}

pub fn sorted_keys(n: usize) -> Vec<KeyPair> {
    let mut keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    keys.sort_by_key(|k| k.address());
    keys
}

pub fn test_config() -> BftConfig {
    BftConfig {
        request_timeout_ms: 60_000,
        ..BftConfig::default()
    }
}

impl Harness {
    pub fn new(local: usize) -> Self {
        let keys = sorted_keys(4);
        let mux = Arc::new(EventMux::new());
        let events = mux.subscribe();
        let addresses = keys.iter().map(KeyPair::address).collect();
        let backend = Arc::new(MockBackend::new(keys[local].clone(), addresses, mux.clone()));
        let ctx = ConsensusContext::new(test_config(), backend.clone(), mux);

        Harness {
            keys,
            backend,
            ctx,
            events,
        }
    }

    pub fn start(&mut self) {
        self.ctx.start_new_round(0);
        self.pump();
    }

    /// Run every queued event, including ones queued while running
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.ctx.handle_event(event);
        }
    }

    pub fn deliver(&mut self, payload: Vec<u8>) {
        self.ctx.handle_event(CoreEvent::Message(payload));
        self.pump();
    }

    pub fn timeout(&mut self) {
        let view = self.ctx.view();
        self.ctx.handle_event(CoreEvent::Timeout(view));
        self.pump();
    }

    pub fn next_block(&self, proposer: usize) -> Proposal {
        let parent = self.backend.head();
        Proposal::Block(block_on(parent.as_block(), &self.keys[proposer]))
    }
}

pub fn block_on(parent: &Block, proposer: &KeyPair) -> Block {
    let mut header = BlockHeader {
        chain_id: parent.header.chain_id,
        height: parent.height() + 1,
        prev_hash: parent.hash(),
        timestamp: parent.header.timestamp + 1,
        tx_root: Hash::ZERO,
        creator: Address::ZERO,
        vote: VoteFlag::Drop,
        extra: BftExtra::default(),
    };
    header.seal(&proposer.secret);
    Block::new(header, Vec::new())
}

pub fn signed(key: &KeyPair, mut msg: Message) -> Vec<u8> {
    msg.address = key.address();
    msg.signature = Some(Seal::sign(&key.secret, &msg.signing_bytes().unwrap()));
    msg.encode().unwrap()
}

pub fn preprepare(key: &KeyPair, view: View, proposal: &Proposal) -> Vec<u8> {
    let payload = serialize::to_bytes(&Preprepare {
        view,
        proposal: proposal.clone(),
    })
    .unwrap();
    signed(key, Message::new(MessageCode::Preprepare, payload))
}

pub fn prepare(key: &KeyPair, view: View, digest: Hash) -> Vec<u8> {
    let payload = serialize::to_bytes(&Subject { view, digest }).unwrap();
    signed(key, Message::new(MessageCode::Prepare, payload))
}

pub fn commit(key: &KeyPair, view: View, digest: Hash) -> Vec<u8> {
    let payload = serialize::to_bytes(&Subject { view, digest }).unwrap();
    let mut msg = Message::new(MessageCode::Commit, payload);
    msg.committed_seal = Some(Seal::sign(&key.secret, &committed_seal_data(&digest)));
    signed(key, msg)
}

pub fn round_change(key: &KeyPair, view: View) -> Vec<u8> {
    let payload = serialize::to_bytes(&Subject {
        view,
        digest: Hash::ZERO,
    })
    .unwrap();
    signed(key, Message::new(MessageCode::RoundChange, payload))
}

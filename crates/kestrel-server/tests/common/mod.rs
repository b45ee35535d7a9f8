#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use kestrel_consensus::BftConfig;
use kestrel_core::{Address, GenesisConfig, KeyPair};
use kestrel_server::{NoopTransport, Server, Transport};
use kestrel_state::{ChainStore, MemoryStorage};
use parking_lot::RwLock;

pub type TestServer = Server<MemoryStorage>;

/// In-process transport delivering straight into the target servers
#[derive(Default)]
pub struct Loopback {
    peers: RwLock<HashMap<Address, Weak<TestServer>>>,
}

impl Loopback {
    pub fn register(&self, server: &Arc<TestServer>) {
        self.peers.write().insert(server.address(), Arc::downgrade(server));
    }
}

impl Transport for Loopback {
    fn send(&self, targets: &[Address], payload: Vec<u8>) {
        let peers = self.peers.read();
        for target in targets {
            if let Some(server) = peers.get(target).and_then(Weak::upgrade) {
                let _ = server.handle_message(payload.clone());
            }
        }
    }
}

pub fn sorted_keys(n: usize) -> Vec<KeyPair> {
    let mut keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    keys.sort_by_key(|k| k.address());
    keys
}

pub fn test_config() -> BftConfig {
    BftConfig {
        request_timeout_ms: 3_000,
        block_period_secs: 0,
        ..BftConfig::default()
    }
}

pub fn genesis_chain(verifiers: &[Address]) -> Arc<RwLock<ChainStore<MemoryStorage>>> {
    let mut chain = ChainStore::new(MemoryStorage::new());
    chain
        .init_genesis(&GenesisConfig {
            chain_id: 7,
            timestamp: 0,
            verifiers: verifiers.to_vec(),
        })
        .unwrap();
    Arc::new(RwLock::new(chain))
}

/// A server for `key` on a fresh chain whose genesis lists `verifiers`
pub fn standalone(key: &KeyPair, verifiers: &[Address]) -> Arc<TestServer> {
    Arc::new(Server::new(
        test_config(),
        key.clone(),
        genesis_chain(verifiers),
        Arc::new(NoopTransport),
    ))
}

/// Poll `condition` every 20ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

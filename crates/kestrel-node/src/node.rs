use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use kestrel_core::{KeyPair, SecretKey};
use kestrel_rpc::{RpcConfig, RpcServer};
use kestrel_server::Server;
use kestrel_state::{ChainStore, FileStorage};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;
use crate::transport::HttpTransport;

/// How often the production loop checks for a new head
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The Kestrel node
pub struct Node {
    config: NodeConfig,
    keypair: KeyPair,
    chain: Arc<RwLock<ChainStore<FileStorage>>>,
}

impl Node {
    /// Create a new node from configuration
    pub fn new(config: NodeConfig) -> Result<Self> {
        let keypair = match config.verifier_key {
            Some(ref key_hex) => KeyPair::from_secret(SecretKey::from_hex(key_hex)?),
            None => {
                warn!("No verifier key configured; using an ephemeral key");
                KeyPair::generate()
            }
        };

        let storage = FileStorage::new(config.data_dir.join("chain.bin"))?;
        let chain = Arc::new(RwLock::new(ChainStore::new(storage)));

        Ok(Node {
            config,
            keypair,
            chain,
        })
    }

    /// Load persisted blocks, writing genesis on first start
    pub fn init_chain(&self) -> Result<()> {
        let mut chain = self.chain.write();
        chain.load_from_storage()?;
        if chain.genesis().is_none() {
            let genesis = chain.init_genesis(&self.config.to_genesis_config()?)?;
            info!("Genesis block {} initialized", genesis.short());
        }
        Ok(())
    }

    /// Run the node
    pub async fn run(self) -> Result<()> {
        info!("Starting Kestrel node");
        self.init_chain()?;

        let address = self.keypair.address();
        let transport = Arc::new(HttpTransport::new(address, self.config.peer_endpoints()?));
        let server = Arc::new(Server::new(
            self.config.bft.clone(),
            self.keypair.clone(),
            Arc::clone(&self.chain),
            transport,
        ));
        server.start()?;
        info!("Consensus running as {}", address);

        let producer = tokio::spawn(produce_blocks(Arc::clone(&server)));

        let rpc_server = RpcServer::new(
            RpcConfig {
                http_addr: self.config.rpc_addr,
            },
            Arc::clone(&server),
        );

        tokio::select! {
            result = rpc_server.run() => {
                if let Err(e) = result {
                    error!("RPC server error: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
            }
        }

        producer.abort();
        server.stop().await?;
        Ok(())
    }
}

/// Submit one block request per height while we are a verifier
async fn produce_blocks(server: Arc<Server<FileStorage>>) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_requested: Option<u64> = None;

    loop {
        ticker.tick().await;

        let height = server.chain().read().height();
        if last_requested == Some(height) {
            continue;
        }

        match server.get_verifiers(None) {
            Ok(verifiers) if verifiers.contains(&server.address()) => {}
            Ok(_) => continue,
            Err(e) => {
                warn!("Cannot read verifier set: {}", e);
                continue;
            }
        }

        match server.produce_block(Vec::new()).await {
            Ok(block) => {
                debug!("Requested block {} at height {}", block.hash().short(), block.height());
                last_requested = Some(height);
            }
            Err(e) => warn!("Failed to produce block on height {}: {}", height, e),
        }
    }
}

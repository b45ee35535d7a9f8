use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kestrel_consensus::BftConfig;
use kestrel_core::{Address, GenesisConfig, KeyPair};
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain ID
    pub chain_id: u64,

    /// Node data directory
    pub data_dir: PathBuf,

    /// RPC bind address
    pub rpc_addr: SocketAddr,

    /// Consensus parameters
    #[serde(default)]
    pub bft: BftConfig,

    /// Genesis configuration
    pub genesis: GenesisConfigFile,

    /// Verifier secret key (hex)
    pub verifier_key: Option<String>,

    /// Other verifiers and their RPC endpoints
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

/// Genesis configuration for file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfigFile {
    pub timestamp: u64,
    /// Initial verifier addresses (hex)
    pub verifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Verifier address (hex)
    pub address: String,
    /// RPC base URL
    pub endpoint: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            chain_id: 1,
            data_dir: PathBuf::from("./kestrel-data"),
            rpc_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            bft: BftConfig::default(),
            genesis: GenesisConfigFile::default(),
            verifier_key: None,
            peers: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Convert genesis config to core type
    pub fn to_genesis_config(&self) -> Result<GenesisConfig> {
        let verifiers = self
            .genesis
            .verifiers
            .iter()
            .map(|s| Address::from_hex(s).with_context(|| format!("invalid verifier address {}", s)))
            .collect::<Result<Vec<_>>>()?;

        Ok(GenesisConfig {
            chain_id: self.chain_id,
            timestamp: self.genesis.timestamp,
            verifiers,
        })
    }

    /// Peer addresses paired with their endpoints
    pub fn peer_endpoints(&self) -> Result<Vec<(Address, String)>> {
        self.peers
            .iter()
            .map(|peer| {
                let address = Address::from_hex(&peer.address)
                    .with_context(|| format!("invalid peer address {}", peer.address))?;
                Ok((address, peer.endpoint.clone()))
            })
            .collect()
    }
}

/// Generate a single-verifier configuration for testing
pub fn generate_sample_config() -> NodeConfig {
    let verifier = KeyPair::generate();

    NodeConfig {
        genesis: GenesisConfigFile {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            verifiers: vec![verifier.address().to_hex()],
        },
        verifier_key: Some(verifier.secret.to_hex()),
        ..NodeConfig::default()
    }
}

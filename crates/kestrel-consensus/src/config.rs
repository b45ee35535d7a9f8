use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::verifier::ProposerPolicy;

/// Consensus tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BftConfig {
    /// Base round timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Minimum seconds between consecutive blocks
    pub block_period_secs: u64,
    pub proposer_policy: ProposerPolicy,
    /// Blocks after which pending membership votes are discarded
    pub epoch: u64,
}

impl Default for BftConfig {
    fn default() -> Self {
        BftConfig {
            request_timeout_ms: 10_000,
            block_period_secs: 1,
            proposer_policy: ProposerPolicy::RoundRobin,
            epoch: 30_000,
        }
    }
}

impl BftConfig {
    /// Round-change timer for `round`: the base timeout plus 2^round seconds
    pub fn round_timeout(&self, round: u64) -> Duration {
        let backoff = 1u64 << round.min(63);
        Duration::from_millis(self.request_timeout_ms).saturating_add(Duration::from_secs(backoff))
    }
}

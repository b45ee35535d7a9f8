//! BFT extra-data region carried in every block header.
//!
//! The region is versioned; writers always emit [`BFT_EXTRA_VERSION`] and
//! readers reject anything else. Verifier list, proposer seal and committed
//! seals share one schema for the sealing and verification paths.

use serde::{Deserialize, Serialize};

use crate::crypto::{Address, Seal};
use crate::error::CoreError;

pub const BFT_EXTRA_VERSION: u8 = 1;

/// Bytes of free-form vanity data at the front of the region
pub const EXTRA_VANITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BftExtra {
    pub version: u8,
    pub vanity: [u8; EXTRA_VANITY],
    /// Verifier list; only populated on genesis
    pub verifiers: Vec<Address>,
    /// Proposer's seal over the seal hash of the header
    pub seal: Option<Seal>,
    /// Commit seals gathered from the quorum, attached when the block is committed
    pub committed_seals: Vec<Seal>,
}

impl BftExtra {
    pub fn new(verifiers: Vec<Address>) -> Self {
        BftExtra {
            version: BFT_EXTRA_VERSION,
            vanity: [0u8; EXTRA_VANITY],
            verifiers,
            seal: None,
            committed_seals: Vec::new(),
        }
    }

    pub fn check_version(&self) -> Result<(), CoreError> {
        if self.version != BFT_EXTRA_VERSION {
            return Err(CoreError::UnsupportedExtraVersion(self.version));
        }
        Ok(())
    }
}

impl Default for BftExtra {
    fn default() -> Self {
        BftExtra::new(Vec::new())
    }
}

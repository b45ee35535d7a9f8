//! Verifier-set snapshots.
//!
//! A snapshot is the verifier set in force after a given block, together with
//! the membership votes still pending. Snapshots are derived by replaying the
//! votes carried in block headers on top of an earlier snapshot.

use std::collections::BTreeMap;

use kestrel_consensus::{ProposerPolicy, VerifierSet};
use kestrel_core::{serialize, Address, BlockHeader, Hash};
use kestrel_state::Storage;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Storage key prefix for checkpointed snapshots
pub const SNAPSHOT_KEY_PREFIX: &[u8] = b"bft-snapshot";

fn snapshot_key(hash: &Hash) -> Vec<u8> {
    [SNAPSHOT_KEY_PREFIX, hash.as_bytes()].concat()
}

/// A single vote cast by a verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Verifier that cast the vote
    pub verifier: Address,
    /// Height of the block carrying the vote
    pub block: u64,
    /// Target of the vote
    pub address: Address,
    /// Add the target if true, remove it otherwise
    pub authorize: bool,
}

/// Running count of votes for one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub authorize: bool,
    pub votes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SnapshotJson", from = "SnapshotJson")]
pub struct Snapshot {
    /// Blocks after which pending votes are discarded; 0 disables the reset
    pub epoch: u64,
    pub height: u64,
    pub hash: Hash,
    /// Votes in the order they were cast
    pub votes: Vec<Vote>,
    pub tally: BTreeMap<Address, Tally>,
    pub verifiers: VerifierSet,
}

#[derive(Serialize, Deserialize)]
struct SnapshotJson {
    epoch: u64,
    number: u64,
    hash: Hash,
    votes: Vec<Vote>,
    tally: BTreeMap<Address, Tally>,
    verifiers: Vec<Address>,
    policy: ProposerPolicy,
}

impl From<Snapshot> for SnapshotJson {
    fn from(snap: Snapshot) -> Self {
        SnapshotJson {
            epoch: snap.epoch,
            number: snap.height,
            hash: snap.hash,
            verifiers: snap.verifiers.list().to_vec(),
            policy: snap.verifiers.policy(),
            votes: snap.votes,
            tally: snap.tally,
        }
    }
}

impl From<SnapshotJson> for Snapshot {
    fn from(json: SnapshotJson) -> Self {
        Snapshot {
            epoch: json.epoch,
            height: json.number,
            hash: json.hash,
            votes: json.votes,
            tally: json.tally,
            verifiers: VerifierSet::new(json.verifiers, json.policy),
        }
    }
}

impl Snapshot {
    pub fn new(epoch: u64, height: u64, hash: Hash, verifiers: VerifierSet) -> Self {
        Snapshot {
            epoch,
            height,
            hash,
            votes: Vec::new(),
            tally: BTreeMap::new(),
            verifiers,
        }
    }

    /// Read the checkpoint stored for `hash`, if any. The configured epoch
    /// replaces the persisted one.
    pub fn load<S: Storage>(storage: &S, epoch: u64, hash: &Hash) -> Result<Option<Self>, ServerError> {
        let Some(blob) = storage.get(&snapshot_key(hash)) else {
            return Ok(None);
        };
        let mut snap: Snapshot = serialize::from_json_bytes(&blob)
            .map_err(|e| ServerError::Serialization(e.to_string()))?;
        snap.epoch = epoch;
        Ok(Some(snap))
    }

    pub fn store<S: Storage>(&self, storage: &mut S) -> Result<(), ServerError> {
        let blob =
            serialize::to_json_bytes(self).map_err(|e| ServerError::Serialization(e.to_string()))?;
        storage.put(&snapshot_key(&self.hash), &blob);
        storage.commit()?;
        Ok(())
    }

    /// A vote is meaningful only if it would change membership
    pub fn check_vote(&self, address: &Address, authorize: bool) -> bool {
        self.verifiers.contains(address) != authorize
    }

    fn cast(&mut self, address: Address, authorize: bool) -> bool {
        if !self.check_vote(&address, authorize) {
            return false;
        }
        self.tally
            .entry(address)
            .and_modify(|tally| tally.votes += 1)
            .or_insert(Tally { authorize, votes: 1 });
        true
    }

    fn uncast(&mut self, address: &Address, authorize: bool) -> bool {
        let Some(tally) = self.tally.get_mut(address) else {
            return false;
        };
        if tally.authorize != authorize {
            return false;
        }
        if tally.votes > 1 {
            tally.votes -= 1;
        } else {
            self.tally.remove(address);
        }
        true
    }

    /// Replay `headers`, which must directly follow this snapshot in height
    /// order, and return the resulting snapshot.
    pub fn apply(&self, headers: &[BlockHeader]) -> Result<Snapshot, ServerError> {
        let Some(last) = headers.last() else {
            return Ok(self.clone());
        };
        if headers.windows(2).any(|w| w[1].height != w[0].height + 1) {
            return Err(ServerError::InvalidVotingChain);
        }
        if headers[0].height != self.height + 1 {
            return Err(ServerError::InvalidVotingChain);
        }

        let mut snap = self.clone();
        for header in headers {
            snap.apply_header(header)?;
        }
        snap.height = last.height;
        snap.hash = last.hash();
        Ok(snap)
    }

    fn apply_header(&mut self, header: &BlockHeader) -> Result<(), ServerError> {
        let height = header.height;
        if self.epoch > 0 && height % self.epoch == 0 {
            self.votes.clear();
            self.tally.clear();
        }

        let signer = header.signer()?;
        if !self.verifiers.contains(&signer) {
            return Err(ServerError::Unauthorized(signer));
        }

        let target = header.creator;
        if target.is_zero() {
            if header.vote.is_authorize() {
                return Err(ServerError::InvalidVote);
            }
            return Ok(());
        }

        // A verifier keeps at most one vote per target
        if let Some(position) = self
            .votes
            .iter()
            .position(|v| v.verifier == signer && v.address == target)
        {
            let previous = self.votes.remove(position);
            self.uncast(&previous.address, previous.authorize);
        }

        let authorize = header.vote.is_authorize();
        if self.cast(target, authorize) {
            self.votes.push(Vote {
                verifier: signer,
                block: height,
                address: target,
                authorize,
            });
        }

        let passed = self
            .tally
            .get(&target)
            .is_some_and(|tally| tally.votes > self.verifiers.size() / 2);
        if passed {
            if authorize {
                self.verifiers.add(target);
            } else {
                self.verifiers.remove(&target);

                // Votes cast by the removed verifier no longer count
                let (dropped, kept): (Vec<Vote>, Vec<Vote>) = std::mem::take(&mut self.votes)
                    .into_iter()
                    .partition(|v| v.verifier == target);
                self.votes = kept;
                for vote in dropped {
                    self.uncast(&vote.address, vote.authorize);
                }
            }

            self.votes.retain(|v| v.address != target);
            self.tally.remove(&target);
        }
        Ok(())
    }

    /// Verifier addresses in ascending order
    pub fn verifiers(&self) -> Vec<Address> {
        self.verifiers.list().to_vec()
    }
}

use kestrel_core::Address;
use serde::{Deserialize, Serialize};

/// How the proposer advances between rounds and sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProposerPolicy {
    /// Rotate to the next verifier after every block
    #[default]
    RoundRobin,
    /// Keep the last proposer until a round change
    Sticky,
}

/// Ordered set of verifiers with the current proposer.
///
/// Addresses are kept sorted ascending without duplicates so that every node
/// derives the same proposer from the same inputs. Cloning yields an
/// independent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSet {
    verifiers: Vec<Address>,
    policy: ProposerPolicy,
    proposer: Option<Address>,
}

impl VerifierSet {
    pub fn new(mut addresses: Vec<Address>, policy: ProposerPolicy) -> Self {
        addresses.sort();
        addresses.dedup();
        let proposer = addresses.first().copied();
        VerifierSet {
            verifiers: addresses,
            policy,
            proposer,
        }
    }

    pub fn size(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    pub fn list(&self) -> &[Address] {
        &self.verifiers
    }

    pub fn policy(&self) -> ProposerPolicy {
        self.policy
    }

    pub fn get_by_index(&self, index: usize) -> Option<Address> {
        self.verifiers.get(index).copied()
    }

    /// Position of `address` in the sorted list
    pub fn get_by_address(&self, address: &Address) -> Option<usize> {
        self.verifiers.binary_search(address).ok()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.get_by_address(address).is_some()
    }

    pub fn get_proposer(&self) -> Option<Address> {
        self.proposer
    }

    pub fn is_proposer(&self, address: &Address) -> bool {
        self.proposer.as_ref() == Some(address)
    }

    /// Pick the proposer for `round` given who proposed the previous block.
    /// A zero `last_proposer` counts from the start of the list; one that is
    /// no longer a member is treated as index 0.
    pub fn calc_proposer(&mut self, last_proposer: &Address, round: u64) {
        if self.verifiers.is_empty() {
            self.proposer = None;
            return;
        }

        let offset = if last_proposer.is_zero() {
            0
        } else {
            let index = self.get_by_address(last_proposer).unwrap_or(0) as u64;
            match self.policy {
                ProposerPolicy::RoundRobin => index + 1,
                ProposerPolicy::Sticky => index,
            }
        };

        let pick = offset.wrapping_add(round) % self.verifiers.len() as u64;
        self.proposer = self.get_by_index(pick as usize);
    }

    /// Insert `address`; false if already present
    pub fn add(&mut self, address: Address) -> bool {
        match self.verifiers.binary_search(&address) {
            Ok(_) => false,
            Err(position) => {
                self.verifiers.insert(position, address);
                true
            }
        }
    }

    /// Remove `address`; false if absent
    pub fn remove(&mut self, address: &Address) -> bool {
        match self.verifiers.binary_search(address) {
            Ok(position) => {
                self.verifiers.remove(position);
                if self.proposer.as_ref() == Some(address) {
                    self.proposer = None;
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Maximum tolerated faulty verifiers: ceil(n/3) - 1
    pub fn f(&self) -> usize {
        self.verifiers.len().div_ceil(3).saturating_sub(1)
    }

    /// Votes needed to reach quorum: 2F + 1
    pub fn quorum(&self) -> usize {
        2 * self.f() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let set = VerifierSet::new(vec![addr(3), addr(1), addr(2), addr(1)], ProposerPolicy::RoundRobin);
        assert_eq!(set.list(), &[addr(1), addr(2), addr(3)]);
        assert_eq!(set.get_by_address(&addr(2)), Some(1));
        assert_eq!(set.get_proposer(), Some(addr(1)));
    }

    #[test]
    fn test_fault_tolerance_bound() {
        for n in 1..=30usize {
            let set = VerifierSet::new((0..n as u8).map(addr).collect(), ProposerPolicy::RoundRobin);
            let f = set.f();
            assert!(3 * f < n, "n={} f={}", n, f);
            assert!(n <= 3 * f + 3, "n={} f={}", n, f);
            assert!(set.quorum() <= n);
        }
    }

    #[test]
    fn test_round_robin_rotation() {
        let mut set = VerifierSet::new(vec![addr(1), addr(2), addr(3), addr(4)], ProposerPolicy::RoundRobin);

        set.calc_proposer(&Address::ZERO, 0);
        assert_eq!(set.get_proposer(), Some(addr(1)));

        set.calc_proposer(&addr(1), 0);
        assert_eq!(set.get_proposer(), Some(addr(2)));

        set.calc_proposer(&addr(4), 0);
        assert_eq!(set.get_proposer(), Some(addr(1)));

        set.calc_proposer(&addr(2), 2);
        assert_eq!(set.get_proposer(), Some(addr(1)));

        // Former member
        set.calc_proposer(&addr(9), 0);
        assert_eq!(set.get_proposer(), Some(addr(2)));
    }

    #[test]
    fn test_round_robin_visits_each_verifier_once() {
        let list: Vec<Address> = (1..=7).map(addr).collect();
        for last in [Address::ZERO, addr(1), addr(4), addr(7), addr(9)] {
            let mut set = VerifierSet::new(list.clone(), ProposerPolicy::RoundRobin);
            let mut seen = std::collections::BTreeSet::new();
            for round in 0..list.len() as u64 {
                set.calc_proposer(&last, round);
                assert!(seen.insert(set.get_proposer().unwrap()), "last={}", last);
            }
            assert_eq!(seen.len(), list.len());
        }
    }

    #[test]
    fn test_sticky_keeps_proposer() {
        let mut set = VerifierSet::new(vec![addr(1), addr(2), addr(3)], ProposerPolicy::Sticky);

        set.calc_proposer(&addr(2), 0);
        assert_eq!(set.get_proposer(), Some(addr(2)));

        set.calc_proposer(&addr(2), 1);
        assert_eq!(set.get_proposer(), Some(addr(3)));

        set.calc_proposer(&addr(9), 1);
        assert_eq!(set.get_proposer(), Some(addr(2)));
    }

    #[test]
    fn test_proposer_deterministic_across_copies() {
        let original = VerifierSet::new(vec![addr(5), addr(7), addr(9)], ProposerPolicy::RoundRobin);
        let mut a = original.clone();
        let mut b = original.clone();
        for round in 0..10 {
            a.calc_proposer(&addr(7), round);
            b.calc_proposer(&addr(7), round);
            assert_eq!(a.get_proposer(), b.get_proposer());
        }
    }

    #[test]
    fn test_add_remove_keep_order() {
        let mut set = VerifierSet::new(vec![addr(2), addr(6)], ProposerPolicy::RoundRobin);
        assert!(set.add(addr(4)));
        assert!(!set.add(addr(4)));
        assert_eq!(set.list(), &[addr(2), addr(4), addr(6)]);

        let copy = set.clone();
        assert!(set.remove(&addr(2)));
        assert!(!set.remove(&addr(2)));
        assert_eq!(set.list(), &[addr(4), addr(6)]);
        assert_eq!(copy.size(), 3);
        assert_eq!(set.get_proposer(), None);
    }

    #[test]
    fn test_empty_set_has_no_proposer() {
        let mut set = VerifierSet::new(Vec::new(), ProposerPolicy::RoundRobin);
        set.calc_proposer(&Address::ZERO, 3);
        assert_eq!(set.get_proposer(), None);
        assert_eq!(set.f(), 0);
    }
}

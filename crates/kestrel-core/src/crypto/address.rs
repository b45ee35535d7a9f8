use std::fmt;

use super::hash::hash_blake3;
use super::hex_serde::impl_hex_serde;
use super::keys::PublicKey;
use crate::error::CoreError;

/// Verifier address: the first 20 bytes of blake3(public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl_hex_serde!(Address, 20);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = hash_blake3(public_key.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[..20]);
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 20] = slice.try_into().ok()?;
        Some(Address(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        Self::from_slice(&bytes).ok_or(CoreError::InvalidAddress)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_address_from_public_key() {
        let kp = KeyPair::generate();
        let addr = Address::from_public_key(&kp.public);
        assert_eq!(addr, Address::from_public_key(&kp.public));
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_address_hex_accepts_prefix() {
        let addr = Address([7u8; 20]);
        let printed = addr.to_string();
        assert!(printed.starts_with("0x"));
        assert_eq!(Address::from_hex(&printed).unwrap(), addr);
        assert!(Address::from_hex("abcd").is_err());
    }

    #[test]
    fn test_address_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(Address([1u8; 20]), 3u64);
        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<Address, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}

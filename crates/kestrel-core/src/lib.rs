//! Kestrel Core - Core types, cryptography, and serialization
//!
//! This crate provides the foundational types shared by the Kestrel
//! consensus engine, its backend and the node: hashes, verifier addresses,
//! seals, block headers and the BFT extra-data schema.

pub mod crypto;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{
    hash_blake3, merkle_root, sign, verify, Address, Hash, KeyPair, PublicKey, Seal, SecretKey,
    Sig,
};
pub use error::CoreError;
pub use types::*;

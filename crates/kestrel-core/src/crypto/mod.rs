mod hex_serde;

pub mod address;
pub mod hash;
pub mod keys;
pub mod seal;

pub use address::Address;
pub use hash::{hash_blake3, merkle_root, Hash};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use seal::{sign, verify, Seal, Sig};

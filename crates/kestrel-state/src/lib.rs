//! Kestrel State - Block storage
//!
//! This crate provides the key/value storage abstraction used for blocks and
//! snapshot checkpoints, plus the canonical chain store.

pub mod chain;
pub mod error;
pub mod storage;

pub use chain::ChainStore;
pub use error::StateError;
pub use storage::{FileStorage, MemoryStorage, Storage};

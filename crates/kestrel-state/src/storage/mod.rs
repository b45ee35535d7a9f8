mod overlay;

pub mod memory;
pub mod persistent;

use crate::error::StateError;

/// Key/value storage with staged writes
pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stage a write; visible to `get` immediately, durable after `commit`
    fn put(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    /// Make staged writes durable
    fn commit(&mut self) -> Result<(), StateError>;

    /// Discard staged writes
    fn rollback(&mut self);

    fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>>;
}

pub use memory::MemoryStorage;
pub use persistent::FileStorage;

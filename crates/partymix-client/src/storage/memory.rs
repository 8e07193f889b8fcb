
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{Storage, StorageError};

/// In-memory storage for tests, simulation, and platforms without a
/// writable config directory.
///
/// Clones share the same map, so a "restart" can be simulated by building a
/// new client over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        map.remove(key);
        Ok(())
    }
}

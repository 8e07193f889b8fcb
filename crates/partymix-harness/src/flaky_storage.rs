//! Storage that can be told to fail.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use partymix_client::{MemoryStorage, Storage, StorageError};

/// [`MemoryStorage`] whose writes can be switched off at runtime.
///
/// Reads always succeed. While writes are failing, `store` and `remove`
/// return [`StorageError::Unavailable`] and leave the records untouched.
#[derive(Debug, Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyStorage {
    /// Working storage over an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects every write from the start.
    pub fn read_only() -> Self {
        let storage = Self::new();
        storage.set_fail_writes(true);
        storage
    }

    /// Toggle write failures. Clones observe the change.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// The backing records.
    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("simulated write failure".to_owned()));
        }
        Ok(())
    }
}

impl Storage for FlakyStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.inner.store(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.inner.remove(key)
    }
}

//! Key-value persistence for client identity and room membership.
//!
//! Only two records survive a restart: the client identifier and the current
//! room code. The trait is synchronous so persistence completes before any
//! later reconnect can read it.

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Key of the durable client identifier.
pub const CLIENT_ID_KEY: &str = "clientId";

/// Key of the current room code.
pub const ROOM_CODE_KEY: &str = "roomCode";

/// Durable string storage.
///
/// Must be Clone (shared by the identity store and the session client),
/// Send + Sync, and synchronous. Implementations typically share internal
/// state, so clones access the same underlying records.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Load the value stored under `key`. `None` if absent.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, overwriting any previous value.
    fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

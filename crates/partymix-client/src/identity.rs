//! Durable client identity.
//!
//! The identifier is minted once per installation and reused across restarts
//! so the server can recognise a returning participant. Persistence failures
//! degrade durability but never availability: the caller always gets an
//! identifier, and it stays stable for the rest of the process.

use std::fmt;

use partymix_core::Environment;

use crate::storage::{CLIENT_ID_KEY, Storage};

/// Opaque, globally unique client identifier (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh UUID v4 from the environment's randomness.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let uuid = uuid::Builder::from_random_bytes(env.random_uuid_bytes()).into_uuid();
        Self(uuid.hyphenated().to_string())
    }

    /// Borrow as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the client identity, generating and persisting it on first use.
#[derive(Debug)]
pub struct IdentityStore<S: Storage> {
    storage: S,
    cached: Option<ClientIdentity>,
    durable: bool,
}

impl<S: Storage> IdentityStore<S> {
    /// Create a store over `storage`. Nothing is read until first use.
    pub fn new(storage: S) -> Self {
        Self { storage, cached: None, durable: false }
    }

    /// Return the installation's identity, creating it if needed.
    ///
    /// Idempotent: every call in a process returns the same value, and every
    /// process sharing the same storage sees the same value once it has been
    /// persisted.
    pub fn get_or_create<E: Environment>(&mut self, env: &E) -> ClientIdentity {
        if let Some(identity) = &self.cached {
            return identity.clone();
        }

        let identity = match self.storage.load(CLIENT_ID_KEY) {
            Ok(Some(stored)) if !stored.trim().is_empty() => {
                self.durable = true;
                ClientIdentity::new(stored.trim())
            },
            Ok(_) => self.mint(env),
            Err(error) => {
                // The record may still be there; never overwrite it.
                tracing::warn!(
                    %error,
                    "failed to read client identity, using a temporary one for this process"
                );
                self.durable = false;
                ClientIdentity::generate(env)
            },
        };

        self.cached = Some(identity.clone());
        identity
    }

    /// `true` once the identity is known to be persisted.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    fn mint<E: Environment>(&mut self, env: &E) -> ClientIdentity {
        let identity = ClientIdentity::generate(env);
        match self.storage.store(CLIENT_ID_KEY, identity.as_str()) {
            Ok(()) => {
                tracing::info!(client_id = %identity, "new client identity created");
                self.durable = true;
            },
            Err(error) => {
                tracing::warn!(
                    %error,
                    client_id = %identity,
                    "could not persist client identity, it will not survive a restart"
                );
                self.durable = false;
            },
        }
        identity
    }
}

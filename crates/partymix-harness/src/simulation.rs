//! Step-by-step runtime execution with invariant checks.
//!
//! [`Simulation`] wires a [`SimDriver`] and a [`Client`] into the production
//! [`Runtime`], then drives it one event at a time, capturing a
//! [`SessionSnapshot`] and checking every registered invariant after each
//! step.

use partymix_app::Runtime;
use partymix_client::{Client, ClientConfig, ClientError, MemoryStorage, Storage};

use crate::{
    SimDriver, SimDriverError, SimEnv,
    invariants::{InvariantRegistry, SessionSnapshot},
};

/// A deterministic client run.
pub struct Simulation<S: Storage = MemoryStorage> {
    runtime: Runtime<SimDriver, SimEnv, S>,
    driver: SimDriver,
    storage: S,
    invariants: InvariantRegistry,
    last: Option<SessionSnapshot>,
    steps: usize,
}

impl Simulation<MemoryStorage> {
    /// Simulation over fresh in-memory storage and the default config.
    pub fn new(seed: u64) -> Result<Self, ClientError> {
        Self::with_storage(SimEnv::with_seed(seed), MemoryStorage::new(), ClientConfig::default())
    }
}

impl<S: Storage> Simulation<S> {
    /// Simulation over the given environment, storage, and config, checked
    /// against [`InvariantRegistry::standard`].
    pub fn with_storage(env: SimEnv, storage: S, config: ClientConfig) -> Result<Self, ClientError> {
        let driver = SimDriver::new(env.clone());
        let client = Client::new(env, storage.clone(), config)?;

        Ok(Self {
            runtime: Runtime::new(driver.clone(), client),
            driver,
            storage,
            invariants: InvariantRegistry::standard(),
            last: None,
            steps: 0,
        })
    }

    /// Replace the invariant registry.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = registry;
        self
    }

    /// Publish initial state and begin connecting.
    pub fn start(&mut self) -> Result<(), SimDriverError> {
        self.runtime.start()?;
        self.check("after start");
        Ok(())
    }

    /// Process scripted events until none remain or the user quits.
    ///
    /// Returns the number of events processed.
    ///
    /// # Panics
    ///
    /// Panics with context if any invariant is violated.
    pub fn run_until_idle(&mut self) -> Result<usize, SimDriverError> {
        let mut processed = 0;
        while let Some(event) = self.driver.poll_next() {
            let context = format!("at step {} ({event:?})", self.steps);
            let quit = self.runtime.step(event)?;
            self.steps += 1;
            processed += 1;
            self.check(&context);
            if quit {
                break;
            }
        }
        Ok(processed)
    }

    /// Tear down the connection, stop the driver, and simulate a process
    /// restart: a new client and driver over the same storage and clock.
    pub fn restart(self, config: ClientConfig) -> Result<Self, ClientError> {
        let env = self.driver.env().clone();
        let storage = self.storage.clone();
        if let Err(e) = self.runtime.shutdown() {
            tracing::warn!(error = %e, "shutdown before restart failed");
        }
        Self::with_storage(env, storage, config)
    }

    /// Tear down the connection and stop the driver.
    pub fn shutdown(self) -> Result<SimDriver, SimDriverError> {
        let driver = self.driver.clone();
        self.runtime.shutdown()?;
        Ok(driver)
    }

    /// The driver, for injection and inspection.
    pub fn driver(&self) -> &SimDriver {
        &self.driver
    }

    /// The client under test.
    pub fn client(&self) -> &Client<SimEnv, S> {
        self.runtime.client()
    }

    /// The storage shared with the client.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self.runtime.client(), &self.storage).after(self.last.as_ref())
    }

    /// Events processed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn check(&mut self, context: &str) {
        let snapshot = self.snapshot();
        self.invariants.assert_all(&snapshot, context);
        self.last = Some(snapshot);
    }
}

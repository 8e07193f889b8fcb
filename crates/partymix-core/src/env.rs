//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (time, randomness). Enables
//! deterministic simulation (virtual clock, seeded RNG) and production use
//! with real system resources.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

/// Abstract environment providing time and randomness.
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses OS entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type. Production uses `std::time::Instant`, simulation uses a
    /// virtual clock.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Add<Duration, Output = Self::Instant>
        + Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Fills the provided buffer with random bytes.
    ///
    /// Given the same seed, a simulation environment produces the same
    /// sequence.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Sixteen random bytes, the size of a UUID.
    fn random_uuid_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Production environment using system time and the OS RNG.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. Without entropy no client
/// identity can be minted, and OS RNG failure indicates a broken platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

//! Deterministic simulation harness for Party Mix client testing.
//!
//! Virtual-time implementations of the Environment and Driver traits for
//! deterministic, reproducible testing of reconnects, restarts, and server
//! traffic without a network.
//!
//! [`Simulation`] wires the production runtime to a [`SimDriver`] and checks
//! the session against [`InvariantRegistry::standard()`] after every step.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod flaky_storage;
pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod simulation;

pub use flaky_storage::FlakyStorage;
pub use invariants::{
    AttemptsBounded, CurrentTrackMatchesQueue, Invariant, InvariantRegistry, InvariantResult,
    LocalVoteNeedsRoom, RoomPersisted, SessionSnapshot, VoteResetCoupling, Violation,
};
pub use sim_driver::{ServerMode, SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use simulation::Simulation;

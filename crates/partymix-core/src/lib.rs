//! Pure core of the Party Mix session client.
//!
//! Nothing in this crate performs I/O. Time and randomness enter through the
//! [`env::Environment`] trait so the same code runs under real time in
//! production and virtual time in simulation.
//!
//! # Components
//!
//! - [`env`]: time and randomness abstraction, plus [`env::SystemEnv`]
//! - [`connection`]: reconnecting transport lifecycle ([`ConnectionManager`])

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;

pub use connection::{
    Backoff, ConnectionAction, ConnectionManager, ConnectionStatus, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, ReconnectPolicy,
};
pub use env::{Environment, SystemEnv};

//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{
    fmt::Debug,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

use partymix_client::{Notice, SessionState};

use crate::DriverEvent;

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the terminal client and simulation.
///
/// # Implementations
///
/// - **Terminal**: stdin commands, tokio-tungstenite WebSocket
/// - **Simulation**: scripted events and recorded frames
///
/// # Errors
///
/// [`open`](Driver::open) and [`send`](Driver::send) failures are transport
/// failures: the runtime logs them and reports the transport closed. Every
/// other error is fatal and ends [`Runtime::run`](crate::Runtime::run).
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + Debug
        + Add<Duration, Output = Self::Instant>
        + Sub<Output = Duration>;

    /// Wait for the next event.
    ///
    /// Returns `None` when input is exhausted and the runtime should stop.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<DriverEvent>, Self::Error>> + Send;

    /// Open a transport to `url`, replacing any previous one.
    ///
    /// Completion is reported later as a socket event.
    fn open(&mut self, url: &str) -> Result<(), Self::Error>;

    /// Send one text frame on the open transport.
    fn send(&mut self, text: String) -> Result<(), Self::Error>;

    /// Close the current transport, if any.
    fn close(&mut self);

    /// Check if the transport is open.
    fn is_open(&self) -> bool;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Show the session state.
    fn publish(&mut self, session: &SessionState) -> Result<(), Self::Error>;

    /// Surface a notice.
    fn notify(&mut self, notice: &Notice) -> Result<(), Self::Error>;

    /// Stop the driver and clean up resources.
    fn stop(&mut self);
}

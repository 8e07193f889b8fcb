//! Application layer for the Party Mix client
//!
//! Generic runtime for driving the session client, enabling deterministic
//! simulation testing with the same code that runs in production.
//!
//! # Components
//!
//! - [`AppEvent`]: user intents and app lifecycle triggers
//! - [`DriverEvent`]: everything a [`Driver`] can report
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod event;
mod runtime;

pub use driver::Driver;
pub use event::{AppEvent, DriverEvent, SocketEvent};
pub use runtime::Runtime;

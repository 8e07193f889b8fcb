//! Headless terminal client for Party Mix
//!
//! A thin shell over [`partymix_app::Driver`] that provides terminal-specific
//! I/O: line commands from stdin, a WebSocket transport, and a plain-text
//! view of the session on stdout. All orchestration logic lives in the
//! generic [`partymix_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod error;
pub mod terminal;
pub mod view;

pub use commands::{CommandError, parse_command};
pub use error::CliError;
pub use partymix_app::{AppEvent, Driver, Runtime};
pub use terminal::{TerminalDriver, TerminalError};

//! Startup errors.

use partymix_client::{ClientError, StorageError};
use thiserror::Error;

use crate::TerminalError;

/// Errors that stop the binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// No usable data directory.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Configuration rejected by the client.
    #[error("config: {0}")]
    Config(#[from] ClientError),

    /// Terminal or transport failure while running.
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    /// Log filter directive did not parse.
    #[error("invalid log filter: {0}")]
    LogFilter(String),
}

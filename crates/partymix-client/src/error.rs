//! Client error types.

use thiserror::Error;

/// Errors raised while constructing a client.
///
/// Session operations never fail; they surface through
/// [`Notice`](crate::Notice)s and the connection status instead.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configured server URL is not a WebSocket URL.
    #[error("invalid server URL {url:?}: {reason}")]
    InvalidServerUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

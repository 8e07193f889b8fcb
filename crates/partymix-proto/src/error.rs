//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding frames.
///
/// Decode errors never reach the UI; the dispatcher logs and drops the frame.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Frame parsed but is not a JSON object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// Frame has neither a `type` nor an `action` field.
    #[error("frame has no type or action discriminator")]
    MissingDiscriminator,

    /// Known frame kind whose payload does not match its shape.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        /// Discriminator of the offending frame
        kind: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// Outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

//! Client events and actions.

use std::time::Instant;

use partymix_proto::ClientMessage;

use crate::Notice;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle and inbound frames
/// - Driving time forward via ticks
/// - Forwarding app lifecycle triggers (connect, foreground, shutdown)
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent<I = Instant> {
    /// Start connecting. Deferred until identity resolves.
    Connect {
        /// Current time
        now: I,
    },

    /// Tear the connection down and stop reconnecting.
    Disconnect,

    /// App returned to the foreground.
    Foreground {
        /// Current time
        now: I,
    },

    /// Transport handshake completed.
    TransportOpened {
        /// Current time
        now: I,
    },

    /// Transport closed, errored, or failed to open.
    TransportClosed {
        /// Current time
        now: I,
        /// Why it closed
        reason: String,
    },

    /// Text frame received from the server.
    FrameReceived(String),

    /// Time tick for reconnect and keep-alive deadlines.
    Tick {
        /// Current time
        now: I,
        /// Whether the caller's transport is still open
        transport_open: bool,
    },
}

/// Actions the caller should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a WebSocket to this URL, replacing any previous transport.
    OpenTransport {
        /// Server endpoint
        url: String,
    },

    /// Close the current transport.
    CloseTransport,

    /// Encode and send this message on the open transport.
    Send(ClientMessage),

    /// Session state changed; republish it to the UI.
    SessionChanged,

    /// Surface a notice to the user.
    Notice(Notice),
}

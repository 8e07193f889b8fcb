//! Runtime input events.
//!
//! Events originate from three sources:
//! - User intents and app lifecycle ([`AppEvent`])
//! - The WebSocket ([`SocketEvent`])
//! - Periodic ticks that let deadlines fire

use partymix_proto::RoomCode;

/// User intents and app lifecycle triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Create a new room.
    CreateRoom,

    /// Join an existing room.
    JoinRoom {
        /// Room to join
        code: RoomCode,
    },

    /// Leave the current room.
    LeaveRoom,

    /// Submit a track link.
    SubmitTrack {
        /// Link as entered
        url: String,
    },

    /// Toggle the local skip vote.
    CastVote,

    /// Ask the server to re-broadcast the queue.
    RefreshQueue,

    /// App returned to the foreground.
    Foreground,

    /// Explicit retry, e.g. after reconnect attempts are exhausted.
    Reconnect,

    /// Republish the current session state.
    ShowStatus,

    /// Quit the application.
    Quit,
}

/// Socket lifecycle reported by the driver's transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake completed.
    Opened,
    /// Text frame from the server.
    Frame(String),
    /// Socket closed, errored, or failed to connect.
    Closed {
        /// Why it closed
        reason: String,
    },
}

/// Everything a driver can hand to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// User intent.
    Input(AppEvent),
    /// Transport callback.
    Socket(SocketEvent),
    /// Periodic tick.
    Tick,
}

impl From<AppEvent> for DriverEvent {
    fn from(event: AppEvent) -> Self {
        Self::Input(event)
    }
}

impl From<SocketEvent> for DriverEvent {
    fn from(event: SocketEvent) -> Self {
        Self::Socket(event)
    }
}

//! User-facing notices.

use std::fmt;

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Transport dropped; reconnecting in the background.
    ConnectionLost,
    /// Reconnect attempts exhausted; needs an explicit retry.
    ConnectionFailed,
    /// The server no longer knows our room.
    RoomNotFound,
    /// Any other error reported by the server.
    ServerError,
}

/// A message for the UI to surface, e.g. as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Category
    pub kind: NoticeKind,
    /// Human-readable text
    pub message: String,
}

impl Notice {
    /// Build a notice.
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// `true` if the notice describes a state that persists until the user
    /// acts, as opposed to a transient hiccup.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.kind == NoticeKind::ConnectionFailed
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

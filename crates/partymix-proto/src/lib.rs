//! Wire protocol for Party Mix room sessions.
//!
//! Every frame is a single UTF-8 JSON object carried in a WebSocket text
//! message. Outbound frames carry an `action` discriminator; inbound frames
//! carry `type`, or `action` for older server variants.
//!
//! # Components
//!
//! - [`ClientMessage`]: closed set of outbound commands
//! - [`ServerMessage`]: closed set of inbound events, produced by a single
//!   validating [`ServerMessage::decode`] step
//! - [`Track`]: queue entry and [`parse_track_details`] for display metadata
//! - [`RoomCode`]: short room identifier

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod message;
mod room;
mod track;

pub use error::ProtocolError;
pub use message::{ClientMessage, ROOM_NOT_FOUND, ServerMessage};
pub use room::RoomCode;
pub use track::{
    Track, TrackDetails, TrackStatus, UNKNOWN_ARTIST, UNKNOWN_TITLE, parse_track_details,
};

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

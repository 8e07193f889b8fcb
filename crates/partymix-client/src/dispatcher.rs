//! Applies inbound server events to the session state.
//!
//! Every decoded frame maps to exactly one row of effects. The dispatcher
//! mutates [`SessionState`] directly and reports anything that needs the
//! outside world (persistence, a follow-up send, a notice) as a [`Dispatch`]
//! so the client can carry it out.

use partymix_proto::{RoomCode, ServerMessage};

use crate::{Notice, NoticeKind, SessionState};

/// Side effects the client must carry out after a dispatch.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Dispatch {
    /// Observable state changed.
    pub changed: bool,
    /// `room_code` changed and must be persisted.
    pub room_changed: bool,
    /// Join this room right away.
    pub join: Option<RoomCode>,
    /// Surface this to the user.
    pub notice: Option<Notice>,
}

/// Decode one raw frame and apply it. Malformed frames are logged and dropped.
pub(crate) fn on_frame(raw: &str, session: &mut SessionState) -> Dispatch {
    match ServerMessage::decode(raw) {
        Ok(message) => apply(message, session),
        Err(error) => {
            tracing::warn!(%error, len = raw.len(), "malformed frame dropped");
            Dispatch::default()
        },
    }
}

/// Apply a decoded event.
pub(crate) fn apply(message: ServerMessage, session: &mut SessionState) -> Dispatch {
    if message.is_room_not_found() {
        return room_not_found(session);
    }

    match message {
        ServerMessage::ClientId { client_id } => {
            tracing::debug!(?client_id, "server acknowledged client");
            Dispatch::default()
        },

        ServerMessage::RoomCreated { room_code } => {
            tracing::info!(%room_code, "room created");
            let room_changed = set_room(session, room_code.clone());
            Dispatch { changed: room_changed, room_changed, join: Some(room_code), notice: None }
        },

        ServerMessage::RoomJoined { room_code, queue, current_track } => {
            tracing::info!(%room_code, "joined room");
            let room_changed = set_room(session, room_code);
            match queue {
                Some(queue) => session.replace_queue(queue, current_track),
                None => session.refresh_current_track(current_track),
            }
            Dispatch { changed: true, room_changed, ..Dispatch::default() }
        },

        ServerMessage::QueueUpdated { queue, current_track } => {
            tracing::debug!(len = queue.len(), "queue replaced");
            session.replace_queue(queue, current_track);
            Dispatch { changed: true, ..Dispatch::default() }
        },

        ServerMessage::VoteUpdate { total_votes, total_clients } => {
            session.set_votes(total_votes, total_clients);
            Dispatch { changed: true, ..Dispatch::default() }
        },

        ServerMessage::VoteCompleted { passed } => {
            if passed {
                session.reset_votes();
            }
            Dispatch { changed: passed, ..Dispatch::default() }
        },

        ServerMessage::Error { message } => {
            tracing::warn!(%message, "server error");
            Dispatch {
                notice: Some(Notice::new(NoticeKind::ServerError, message)),
                ..Dispatch::default()
            }
        },

        ServerMessage::Unknown { kind } => {
            tracing::debug!(%kind, "ignoring unknown server message");
            Dispatch::default()
        },
    }
}

/// The room is gone. Its tally goes with it; the queue stays on screen.
fn room_not_found(session: &mut SessionState) -> Dispatch {
    tracing::warn!(room_code = ?session.room_code, "room no longer exists");
    let room_changed = session.room_code.take().is_some();
    let tally_cleared = session.clear_tally();
    Dispatch {
        changed: room_changed || tally_cleared,
        room_changed,
        join: None,
        notice: Some(Notice::new(NoticeKind::RoomNotFound, partymix_proto::ROOM_NOT_FOUND)),
    }
}

/// Entering a different room starts from an empty tally.
fn set_room(session: &mut SessionState, room_code: RoomCode) -> bool {
    if session.room_code.as_ref() == Some(&room_code) {
        return false;
    }
    session.room_code = Some(room_code);
    session.clear_tally();
    true
}

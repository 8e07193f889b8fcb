//! Plain-text rendering of session state and notices.

use std::fmt::Write as _;

use partymix_client::{Notice, SessionState};
use partymix_proto::{Track, TrackStatus};

/// Render the session as a summary line followed by the queue.
pub fn render_session(session: &SessionState) -> String {
    let mut out = format!("[{}]", session.connection_status());

    match session.room_code() {
        Some(code) => {
            let _ = write!(out, " room {code}");
        },
        None => out.push_str(" no room"),
    }

    if session.room_code().is_some() {
        let _ = write!(out, " | votes {}/{}", session.vote_count(), session.total_clients());
        if session.has_voted_locally() {
            out.push_str(" (voted)");
        }
    }

    if let Some(track) = session.current_track() {
        let _ = write!(out, "\n  now playing: {}", track_line(track));
    }

    for (position, track) in session.queue().iter().enumerate() {
        let marker = match track.status {
            TrackStatus::Playing => '>',
            TrackStatus::Pending => ' ',
        };
        let _ = write!(out, "\n  {marker}{:>2}. {}", position + 1, track_line(track));
    }
    out
}

/// Render a notice. Persistent notices are marked so they stand out.
pub fn render_notice(notice: &Notice) -> String {
    if notice.is_persistent() { format!("!! {notice}") } else { format!("-- {notice}") }
}

fn track_line(track: &Track) -> String {
    let details = track.details();
    if details.is_unknown() {
        track.url.clone()
    } else {
        format!("{} by {}", details.title, details.artist)
    }
}

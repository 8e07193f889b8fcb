//! Line command parsing.
//!
//! One line of input is one command. A leading `/` is optional, so both
//! `join 4821` and `/join 4821` work.

use partymix_app::AppEvent;
use partymix_proto::RoomCode;
use thiserror::Error;

/// Help text listing every command.
pub const HELP: &str = "commands: create | join <code> | leave | submit <url> | vote | refresh | \
                        foreground | reconnect | status | quit";

/// A line that is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// First word is not a command.
    #[error("unknown command '{0}', {HELP}")]
    Unknown(String),

    /// Command is missing its argument.
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line.
///
/// Returns `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<AppEvent>, CommandError> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);

    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let argument = parts.next();

    let event = match command.to_ascii_lowercase().as_str() {
        "create" => AppEvent::CreateRoom,
        "join" => {
            let code = argument.ok_or(CommandError::Usage("join <code>"))?;
            AppEvent::JoinRoom { code: RoomCode::new(code) }
        },
        "leave" => AppEvent::LeaveRoom,
        "submit" | "add" => {
            let url = argument.ok_or(CommandError::Usage("submit <url>"))?;
            AppEvent::SubmitTrack { url: url.to_owned() }
        },
        "vote" | "skip" => AppEvent::CastVote,
        "refresh" => AppEvent::RefreshQueue,
        "foreground" | "fg" => AppEvent::Foreground,
        "reconnect" => AppEvent::Reconnect,
        "status" => AppEvent::ShowStatus,
        "quit" | "q" | "exit" => AppEvent::Quit,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(event))
}

//! Outbound commands and inbound events.
//!
//! Both directions are closed tagged unions. Outbound frames are produced by
//! serde with an `action` tag. Inbound frames go through
//! [`ServerMessage::decode`], which validates the whole frame once at the
//! boundary so nothing downstream handles raw JSON.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{ProtocolError, Result, RoomCode, Track};

/// Error payload that means the room no longer exists on the server.
pub const ROOM_NOT_FOUND: &str = "Room not found";

/// Commands sent from this client to the session server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Announce this client's identity. Sent on every successful open.
    #[serde(rename_all = "camelCase")]
    ClientInfo {
        /// Durable client identifier
        client_id: String,
    },

    /// Ask the server to create a fresh room.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        /// Durable client identifier
        client_id: String,
    },

    /// Join an existing room.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        /// Room to join
        room_id: RoomCode,
        /// Durable client identifier
        client_id: String,
    },

    /// Leave the current room.
    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        /// Durable client identifier
        client_id: String,
    },

    /// Submit a track link to the room queue.
    #[serde(rename_all = "camelCase")]
    SendSong {
        /// Target room
        room_code: RoomCode,
        /// Raw link as entered by the user
        soundcloud_url: String,
        /// Durable client identifier
        client_id: String,
    },

    /// Add or withdraw a skip vote.
    #[serde(rename_all = "camelCase")]
    Vote {
        /// Target room
        room_code: RoomCode,
        /// `true` to vote, `false` to withdraw
        vote: bool,
        /// Durable client identifier
        client_id: String,
    },

    /// Ask the server to re-broadcast the queue.
    #[serde(rename_all = "camelCase")]
    RefreshQueue {
        /// Target room
        room_code: RoomCode,
        /// Durable client identifier
        client_id: String,
    },

    /// Keep-alive. Encoded as `{"type":"heartbeat"}`, outside the action set.
    #[serde(skip)]
    Heartbeat,
}

impl ClientMessage {
    /// Encode as a single JSON text frame.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Heartbeat => {
                serde_json::to_string(&serde_json::json!({ "type": "heartbeat" }))
                    .map_err(ProtocolError::Encode)
            },
            other => serde_json::to_string(other).map_err(ProtocolError::Encode),
        }
    }

    /// Wire name of this command, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientInfo { .. } => "clientInfo",
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::LeaveRoom { .. } => "leaveRoom",
            Self::SendSong { .. } => "sendSong",
            Self::Vote { .. } => "vote",
            Self::RefreshQueue { .. } => "refreshQueue",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// Events pushed by the session server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Acknowledgment of the client announcement.
    ClientId {
        /// Identifier echoed back by the server, if any
        client_id: Option<String>,
    },

    /// A room was created on our behalf.
    RoomCreated {
        /// Code of the new room
        room_code: RoomCode,
    },

    /// This client is now a member of a room.
    RoomJoined {
        /// Code of the joined room
        room_code: RoomCode,
        /// Full queue snapshot, when the server includes it
        queue: Option<Vec<Track>>,
        /// Now-playing track, when the server includes it
        current_track: Option<Track>,
    },

    /// Wholesale queue replacement (`queueUpdate`, `queueUpdated`,
    /// `queueRefreshed`).
    QueueUpdated {
        /// Full queue snapshot
        queue: Vec<Track>,
        /// Now-playing track, when the server includes it
        current_track: Option<Track>,
    },

    /// New skip-vote tally.
    VoteUpdate {
        /// Votes cast so far
        total_votes: u32,
        /// Participants in the room, when the server includes it
        total_clients: Option<u32>,
    },

    /// A skip vote concluded.
    VoteCompleted {
        /// `true` if the vote passed and the track was skipped
        passed: bool,
    },

    /// Protocol-level error reported by the server.
    Error {
        /// Human-readable error text
        message: String,
    },

    /// Well-formed frame with a discriminator this client does not handle.
    Unknown {
        /// The unrecognized discriminator
        kind: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientIdPayload {
    #[serde(default)]
    client_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomCreatedPayload {
    room_code: RoomCode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomJoinedPayload {
    room_code: RoomCode,
    #[serde(default)]
    queue: Option<Vec<Track>>,
    #[serde(default)]
    current_track: Option<Track>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueuePayload {
    queue: Vec<Track>,
    #[serde(default)]
    current_track: Option<Track>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteUpdatePayload {
    #[serde(alias = "votes")]
    total_votes: u32,
    #[serde(default)]
    total_clients: Option<u32>,
}

#[derive(Deserialize)]
struct VoteCompletedPayload {
    #[serde(default)]
    result: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ServerMessage {
    /// Validate and decode one inbound text frame.
    ///
    /// A string `error` field takes precedence over any discriminator. The
    /// discriminator is read from `type`, falling back to `action`.
    /// Unrecognized discriminators decode to [`ServerMessage::Unknown`] rather
    /// than failing.
    pub fn decode(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(ProtocolError::InvalidJson)?;
        let Value::Object(object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        if let Some(message) = object.get("error").and_then(Value::as_str) {
            return Ok(Self::Error { message: message.to_owned() });
        }

        let kind = discriminator(&object).ok_or(ProtocolError::MissingDiscriminator)?.to_owned();

        let message = match kind.as_str() {
            "clientId" => {
                let p: ClientIdPayload = payload(&kind, object)?;
                Self::ClientId { client_id: p.client_id }
            },
            "roomCreated" => {
                let p: RoomCreatedPayload = payload(&kind, object)?;
                Self::RoomCreated { room_code: p.room_code }
            },
            "roomJoined" | "joinedRoom" => {
                let p: RoomJoinedPayload = payload(&kind, object)?;
                Self::RoomJoined {
                    room_code: p.room_code,
                    queue: p.queue,
                    current_track: p.current_track,
                }
            },
            "queueUpdate" | "queueUpdated" | "queueRefreshed" => {
                let p: QueuePayload = payload(&kind, object)?;
                Self::QueueUpdated { queue: p.queue, current_track: p.current_track }
            },
            "voteUpdate" | "votesUpdated" => {
                let p: VoteUpdatePayload = payload(&kind, object)?;
                Self::VoteUpdate { total_votes: p.total_votes, total_clients: p.total_clients }
            },
            "voteCompleted" => {
                let p: VoteCompletedPayload = payload(&kind, object)?;
                Self::VoteCompleted { passed: p.result.as_deref() == Some("passed") }
            },
            "error" => {
                let p: ErrorPayload = payload(&kind, object)?;
                Self::Error {
                    message: p
                        .message
                        .or(p.error)
                        .unwrap_or_else(|| "unspecified server error".to_owned()),
                }
            },
            _ => Self::Unknown { kind },
        };

        Ok(message)
    }

    /// `true` for the error that means our room no longer exists.
    #[must_use]
    pub fn is_room_not_found(&self) -> bool {
        matches!(self, Self::Error { message } if message == ROOM_NOT_FOUND)
    }
}

fn discriminator(object: &Map<String, Value>) -> Option<&str> {
    object
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| object.get("action").and_then(Value::as_str))
}

fn payload<T: DeserializeOwned>(kind: &str, object: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(object))
        .map_err(|source| ProtocolError::InvalidPayload { kind: kind.to_owned(), source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn encoded(message: &ClientMessage) -> Value {
        serde_json::from_str(&message.encode().unwrap()).unwrap()
    }

    #[test]
    fn encodes_commands_with_action_tag() {
        let join = ClientMessage::JoinRoom { room_id: "4821".into(), client_id: "c1".into() };
        assert_eq!(encoded(&join), json!({"action": "joinRoom", "roomId": "4821", "clientId": "c1"}));

        let song = ClientMessage::SendSong {
            room_code: "4821".into(),
            soundcloud_url: "https://soundcloud.com/a/b".into(),
            client_id: "c1".into(),
        };
        assert_eq!(
            encoded(&song),
            json!({
                "action": "sendSong",
                "roomCode": "4821",
                "soundcloudUrl": "https://soundcloud.com/a/b",
                "clientId": "c1",
            })
        );

        let vote = ClientMessage::Vote { room_code: "9".into(), vote: true, client_id: "c1".into() };
        assert_eq!(
            encoded(&vote),
            json!({"action": "vote", "roomCode": "9", "vote": true, "clientId": "c1"})
        );
    }

    #[test]
    fn heartbeat_uses_type_tag() {
        assert_eq!(encoded(&ClientMessage::Heartbeat), json!({"type": "heartbeat"}));
    }

    #[test]
    fn decodes_type_and_action_discriminators() {
        let by_type = ServerMessage::decode(r#"{"type":"roomCreated","roomCode":"4821"}"#).unwrap();
        let by_action =
            ServerMessage::decode(r#"{"action":"roomCreated","roomCode":4821}"#).unwrap();

        assert_eq!(by_type, ServerMessage::RoomCreated { room_code: "4821".into() });
        assert_eq!(by_type, by_action);
    }

    #[test]
    fn queue_aliases_decode_to_one_variant() {
        for kind in ["queueUpdate", "queueUpdated", "queueRefreshed"] {
            let raw = json!({"type": kind, "queue": ["https://soundcloud.com/a/b"]}).to_string();
            let message = ServerMessage::decode(&raw).unwrap();
            assert_eq!(message, ServerMessage::QueueUpdated {
                queue: vec![Track::new("https://soundcloud.com/a/b")],
                current_track: None,
            });
        }
    }

    #[test]
    fn queue_with_odd_entries_still_replaces() {
        let raw = json!({
            "type": "queueUpdate",
            "queue": [
                {"url": "https://soundcloud.com/a/new", "addedAt": 1_714_564_800_000.5_f64},
                {"url": "https://soundcloud.com/b/new", "status": null},
                {"url": "https://soundcloud.com/c/new", "addedAt": "Wed May 01 2024 12:00:00 GMT+0000"},
            ],
        })
        .to_string();

        let first = Track {
            added_at: chrono::DateTime::from_timestamp_millis(1_714_564_800_000),
            ..Track::new("https://soundcloud.com/a/new")
        };
        assert_eq!(ServerMessage::decode(&raw).unwrap(), ServerMessage::QueueUpdated {
            queue: vec![
                first,
                Track::new("https://soundcloud.com/b/new"),
                Track::new("https://soundcloud.com/c/new"),
            ],
            current_track: None,
        });
    }

    #[test]
    fn vote_update_accepts_legacy_field_names() {
        let message =
            ServerMessage::decode(r#"{"action":"votesUpdated","votes":2,"totalClients":5}"#)
                .unwrap();
        assert_eq!(message, ServerMessage::VoteUpdate { total_votes: 2, total_clients: Some(5) });
    }

    #[test]
    fn vote_completed_checks_result() {
        let passed = ServerMessage::decode(r#"{"type":"voteCompleted","result":"passed"}"#).unwrap();
        let failed = ServerMessage::decode(r#"{"type":"voteCompleted","result":"failed"}"#).unwrap();

        assert_eq!(passed, ServerMessage::VoteCompleted { passed: true });
        assert_eq!(failed, ServerMessage::VoteCompleted { passed: false });
    }

    #[test]
    fn error_field_takes_precedence() {
        let message =
            ServerMessage::decode(r#"{"action":"queueUpdated","error":"Room not found"}"#).unwrap();
        assert!(message.is_room_not_found());

        let typed = ServerMessage::decode(r#"{"type":"error","message":"Too many votes"}"#).unwrap();
        assert_eq!(typed, ServerMessage::Error { message: "Too many votes".into() });
        assert!(!typed.is_room_not_found());
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let message = ServerMessage::decode(r#"{"type":"songAdded","url":"x"}"#).unwrap();
        assert_eq!(message, ServerMessage::Unknown { kind: "songAdded".into() });
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(ServerMessage::decode("{not json"), Err(ProtocolError::InvalidJson(_))));
        assert!(matches!(ServerMessage::decode("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(
            ServerMessage::decode(r#"{"queue":[]}"#),
            Err(ProtocolError::MissingDiscriminator)
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"type":"queueUpdate","queue":"nope"}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }
}

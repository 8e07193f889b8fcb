//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of a client at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use partymix_client::{Client, SessionState, Storage, storage::ROOM_CODE_KEY};
use partymix_core::{ConnectionStatus, Environment};

/// Snapshot of one client's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection status mirrored into the session.
    pub status: ConnectionStatus,
    /// Room the session is in.
    pub room_code: Option<String>,
    /// Room code found in storage. `None` if absent or unreadable.
    pub persisted_room: Option<String>,
    /// URL at the head of the queue.
    pub queue_head: Option<String>,
    /// URL of the current track.
    pub current_track: Option<String>,
    /// Skip votes cast.
    pub vote_count: u32,
    /// Vote count of the previous snapshot, for transition checks.
    pub previous_vote_count: Option<u32>,
    /// Local vote flag.
    pub has_voted_locally: bool,
    /// Reconnect attempts in the current cycle.
    pub reconnect_attempt: u32,
    /// Configured retry bound.
    pub max_attempts: u32,
}

impl SessionSnapshot {
    /// Capture a client and its persisted room code.
    pub fn capture<E, S>(client: &Client<E, S>, storage: &S) -> Self
    where
        E: Environment,
        S: Storage,
    {
        let connection = client.connection();
        Self {
            reconnect_attempt: connection.attempt(),
            max_attempts: connection.policy().max_attempts,
            persisted_room: storage.load(ROOM_CODE_KEY).ok().flatten(),
            ..Self::from_session(client.session())
        }
    }

    /// Capture only the session fields.
    pub fn from_session(session: &SessionState) -> Self {
        Self {
            status: session.connection_status(),
            room_code: session.room_code().map(|code| code.as_str().to_owned()),
            queue_head: session.queue().first().map(|track| track.url.clone()),
            current_track: session.current_track().map(|track| track.url.clone()),
            vote_count: session.vote_count(),
            has_voted_locally: session.has_voted_locally(),
            ..Self::default()
        }
    }

    /// Record the vote count observed before this snapshot.
    #[must_use]
    pub fn after(mut self, previous: Option<&Self>) -> Self {
        self.previous_vote_count = previous.map(|p| p.vote_count);
        self
    }
}

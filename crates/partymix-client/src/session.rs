//! Observable session state.

use partymix_core::ConnectionStatus;
use partymix_proto::{RoomCode, Track};

/// Snapshot of the session as the UI sees it.
///
/// Server-sourced fields are written only by the dispatcher. The command API
/// writes `has_voted_locally` and clears `room_code` on leave. The UI only
/// gets `&SessionState`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub(crate) connection_status: ConnectionStatus,
    pub(crate) room_code: Option<RoomCode>,
    pub(crate) queue: Vec<Track>,
    pub(crate) current_track: Option<Track>,
    pub(crate) vote_count: u32,
    pub(crate) total_clients: u32,
    pub(crate) has_voted_locally: bool,
}

impl SessionState {
    /// Transport status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_status
    }

    /// Room this client belongs to, if any.
    #[must_use]
    pub fn room_code(&self) -> Option<&RoomCode> {
        self.room_code.as_ref()
    }

    /// Server-ordered queue. Index 0 is now playing.
    #[must_use]
    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    /// Now-playing track. Always `queue[0]` when the queue is non-empty.
    #[must_use]
    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    /// Skip votes cast in the current round.
    #[must_use]
    pub fn vote_count(&self) -> u32 {
        self.vote_count
    }

    /// Participants in the room as last reported.
    #[must_use]
    pub fn total_clients(&self) -> u32 {
        self.total_clients
    }

    /// Whether this client has a skip vote outstanding.
    #[must_use]
    pub fn has_voted_locally(&self) -> bool {
        self.has_voted_locally
    }

    /// Replace the queue wholesale and recompute the current track.
    pub(crate) fn replace_queue(&mut self, queue: Vec<Track>, provided: Option<Track>) {
        self.queue = queue;
        self.refresh_current_track(provided);
    }

    /// `current_track` is the queue head when there is one, else the track the
    /// server provided, else nothing.
    pub(crate) fn refresh_current_track(&mut self, provided: Option<Track>) {
        self.current_track = match self.queue.first() {
            Some(head) => {
                if let Some(provided) = provided.as_ref().filter(|p| p.url != head.url) {
                    tracing::debug!(
                        provided = %provided.url,
                        head = %head.url,
                        "server current track disagrees with queue head, using queue head"
                    );
                }
                Some(head.clone())
            },
            None => provided,
        };
    }

    /// Record a new tally. A zero count also clears the local vote flag.
    pub(crate) fn set_votes(&mut self, vote_count: u32, total_clients: Option<u32>) {
        self.vote_count = vote_count;
        if let Some(total) = total_clients {
            self.total_clients = total;
        }
        if vote_count == 0 {
            self.has_voted_locally = false;
        }
    }

    /// Vote round ended.
    pub(crate) fn reset_votes(&mut self) {
        self.vote_count = 0;
        self.has_voted_locally = false;
    }

    /// Drop the tally of a room this client is no longer in. Returns `true`
    /// if anything was set.
    pub(crate) fn clear_tally(&mut self) -> bool {
        let had_tally = self.vote_count > 0 || self.total_clients > 0 || self.has_voted_locally;
        self.reset_votes();
        self.total_clients = 0;
        had_tally
    }

    /// Forget everything scoped to the current room.
    pub(crate) fn leave_room(&mut self) {
        self.room_code = None;
        self.queue.clear();
        self.current_track = None;
        self.clear_tally();
    }
}

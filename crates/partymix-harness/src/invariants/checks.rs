//! Session checks registered by [`InvariantRegistry::standard`].
//!
//! [`InvariantRegistry::standard`]: super::InvariantRegistry::standard

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// A vote count that drops to zero clears the local vote flag.
///
/// A flag raised while the count is already zero is allowed: the local vote
/// has been sent and the server has not tallied it yet.
pub struct VoteResetCoupling;

impl Invariant for VoteResetCoupling {
    fn name(&self) -> &'static str {
        "VoteResetCoupling"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let dropped_to_zero =
            state.vote_count == 0 && state.previous_vote_count.is_some_and(|prev| prev > 0);

        if dropped_to_zero && state.has_voted_locally {
            return Err(Violation::new(
                self.name(),
                format!(
                    "vote count reset from {:?} to 0 but local vote flag is still set",
                    state.previous_vote_count
                ),
            ));
        }
        Ok(())
    }
}

/// A local vote only exists inside a room.
///
/// Leaving the room or losing it on the server drops the flag, so the first
/// vote in the next room is always an upvote.
pub struct LocalVoteNeedsRoom;

impl Invariant for LocalVoteNeedsRoom {
    fn name(&self) -> &'static str {
        "LocalVoteNeedsRoom"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.has_voted_locally && state.room_code.is_none() {
            return Err(Violation::new(self.name(), "local vote flag set without a room"));
        }
        Ok(())
    }
}

/// A non-empty queue's head is the current track.
pub struct CurrentTrackMatchesQueue;

impl Invariant for CurrentTrackMatchesQueue {
    fn name(&self) -> &'static str {
        "CurrentTrackMatchesQueue"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if let Some(head) = &state.queue_head {
            if state.current_track.as_ref() != Some(head) {
                return Err(Violation::new(
                    self.name(),
                    format!(
                        "queue head {head} but current track {:?}",
                        state.current_track
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// The persisted room code always equals the session's room code.
///
/// A restart must rejoin exactly the room the user was last in.
pub struct RoomPersisted;

impl Invariant for RoomPersisted {
    fn name(&self) -> &'static str {
        "RoomPersisted"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.persisted_room != state.room_code {
            return Err(Violation::new(
                self.name(),
                format!(
                    "session room {:?} but storage holds {:?}",
                    state.room_code, state.persisted_room
                ),
            ));
        }
        Ok(())
    }
}

/// Reconnect attempts never exceed the configured bound.
pub struct AttemptsBounded;

impl Invariant for AttemptsBounded {
    fn name(&self) -> &'static str {
        "AttemptsBounded"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.reconnect_attempt > state.max_attempts {
            return Err(Violation::new(
                self.name(),
                format!(
                    "attempt {} exceeds max {}",
                    state.reconnect_attempt, state.max_attempts
                ),
            ));
        }
        Ok(())
    }
}

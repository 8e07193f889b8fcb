//! Property-based tests for session state under arbitrary server traffic.
//!
//! Tests verify that the vote coupling and queue/current-track consistency
//! hold after every inbound frame and every local command, whatever order
//! they arrive in.

use std::time::Instant;

use partymix_client::{Client, ClientAction, ClientConfig, ClientEvent, MemoryStorage, Storage};
use partymix_core::Environment;
use proptest::prelude::*;
use serde_json::json;

#[derive(Clone)]
struct FixedEnv(Instant);

impl Environment for FixedEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        self.0
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5a);
    }
}

#[derive(Debug, Clone)]
enum Step {
    Frame(String),
    Vote,
    Leave,
}

fn track() -> impl Strategy<Value = String> {
    "[a-c]{1,2}".prop_map(|slug| format!("https://soundcloud.com/artist/{slug}"))
}

fn frame_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => (0u32..5, 1u32..6).prop_map(|(votes, clients)| {
            json!({"type": "voteUpdate", "totalVotes": votes, "totalClients": clients}).to_string()
        }),
        2 => prop_oneof![Just("passed"), Just("failed")]
            .prop_map(|result| json!({"type": "voteCompleted", "result": result}).to_string()),
        3 => (prop::collection::vec(track(), 0..4), prop::option::of(track())).prop_map(
            |(queue, current)| {
                json!({"type": "queueUpdate", "queue": queue, "currentTrack": current}).to_string()
            }
        ),
        1 => "[0-9]{4}".prop_map(|code| {
            json!({"type": "roomJoined", "roomCode": code, "queue": []}).to_string()
        }),
        1 => Just(json!({"error": "Room not found"}).to_string()),
        1 => ".{0,12}",
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => frame_strategy().prop_map(Step::Frame),
        2 => Just(Step::Vote),
        1 => Just(Step::Leave),
    ]
}

fn open_client(storage: MemoryStorage) -> Client<FixedEnv, MemoryStorage> {
    let env = FixedEnv(Instant::now());
    let now = env.now();
    let mut client = Client::new(env, storage, ClientConfig::default()).unwrap();
    client.resolve_identity();
    client.handle(ClientEvent::Connect { now });
    client.handle(ClientEvent::TransportOpened { now });
    client
}

proptest! {
    #[test]
    fn prop_session_invariants_hold(steps in prop::collection::vec(step_strategy(), 0..60)) {
        let storage = MemoryStorage::new();
        let mut client = open_client(storage.clone());
        let mut awaiting_tally = false;

        for step in steps {
            match &step {
                Step::Vote => awaiting_tally = true,
                Step::Leave => awaiting_tally = false,
                Step::Frame(raw) if raw.contains("voteUpdate") || raw.contains("passed") => {
                    awaiting_tally = false;
                },
                Step::Frame(_) => {},
            }
            let actions = match step {
                Step::Frame(raw) => client.handle(ClientEvent::FrameReceived(raw)),
                Step::Vote => client.cast_vote(),
                Step::Leave => client.leave_room(),
            };
            let session = client.session();

            // Between a local vote and the next tally the flag may lead the count.
            if session.vote_count() == 0 && !awaiting_tally {
                prop_assert!(!session.has_voted_locally());
            }

            // A local vote never outlives the room it was cast in.
            if session.room_code().is_none() {
                prop_assert!(!session.has_voted_locally());
            }

            match (session.queue().first(), session.current_track()) {
                (Some(head), current) => prop_assert_eq!(Some(head), current),
                (None, _) => {},
            }

            let persisted = storage.load("roomCode").unwrap();
            prop_assert_eq!(persisted.as_deref(), session.room_code().map(|c| c.as_str()));

            let changed = actions.iter().filter(|a| **a == ClientAction::SessionChanged).count();
            prop_assert!(changed <= 1);
        }
    }

    #[test]
    fn prop_zero_tally_clears_local_vote(votes in prop::collection::vec(0u32..4, 1..20)) {
        let mut client = open_client(MemoryStorage::new());
        client.handle(ClientEvent::FrameReceived(
            json!({"type": "roomJoined", "roomCode": "1", "queue": []}).to_string(),
        ));

        for count in votes {
            if !client.session().has_voted_locally() {
                client.cast_vote();
            }
            client.handle(ClientEvent::FrameReceived(
                json!({"type": "voteUpdate", "totalVotes": count, "totalClients": 4}).to_string(),
            ));
            if client.session().vote_count() == 0 {
                prop_assert!(!client.session().has_voted_locally());
            }
        }
    }

    #[test]
    fn prop_queue_replacement_is_wholesale(
        first in prop::collection::vec(track(), 0..5),
        second in prop::collection::vec(track(), 0..5),
    ) {
        let mut client = open_client(MemoryStorage::new());
        client.handle(ClientEvent::FrameReceived(json!({"type": "queueUpdate", "queue": first}).to_string()));
        client.handle(ClientEvent::FrameReceived(json!({"type": "queueRefreshed", "queue": second}).to_string()));

        let urls: Vec<_> = client.session().queue().iter().map(|t| t.url.clone()).collect();
        prop_assert_eq!(urls, second);
    }
}

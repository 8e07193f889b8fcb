//! Property-based tests over whole runtime executions.
//!
//! Random scripts of user intents, server frames, drops, and clock advances
//! run through the production runtime; [`Simulation`] asserts the standard
//! invariants after every step.

use std::time::Duration;

use partymix_app::AppEvent;
use partymix_core::ConnectionStatus;
use partymix_harness::{ServerMode, Simulation};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Input(AppEvent),
    Frame(String),
    Drop,
    Advance(u64),
    Mode(ServerMode),
}

fn frame_strategy() -> impl Strategy<Value = String> {
    let url = "[a-c]{1,2}".prop_map(|slug| format!("https://soundcloud.com/artist/{slug}"));
    prop_oneof![
        (0u32..4).prop_map(|votes| json!({"type": "voteUpdate", "totalVotes": votes, "totalClients": 4}).to_string()),
        Just(json!({"type": "voteCompleted", "result": "passed"}).to_string()),
        (prop::collection::vec(url.clone(), 0..4), prop::option::of(url)).prop_map(|(queue, current)| {
            json!({"type": "queueUpdate", "queue": queue, "currentTrack": current}).to_string()
        }),
        "[0-9]{2}".prop_map(|code| json!({"type": "roomJoined", "roomCode": code}).to_string()),
        "[0-9]{2}".prop_map(|code| json!({"type": "roomCreated", "roomCode": code}).to_string()),
        Just(json!({"error": "Room not found"}).to_string()),
        Just("not json".to_owned()),
    ]
}

fn input_strategy() -> impl Strategy<Value = AppEvent> {
    prop_oneof![
        Just(AppEvent::CreateRoom),
        "[0-9]{2}".prop_map(|code| AppEvent::JoinRoom { code: code.as_str().into() }),
        Just(AppEvent::LeaveRoom),
        Just(AppEvent::SubmitTrack { url: "https://soundcloud.com/a/b".into() }),
        Just(AppEvent::CastVote),
        Just(AppEvent::RefreshQueue),
        Just(AppEvent::Foreground),
        Just(AppEvent::Reconnect),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => input_strategy().prop_map(Op::Input),
        4 => frame_strategy().prop_map(Op::Frame),
        1 => Just(Op::Drop),
        2 => (1u64..40).prop_map(Op::Advance),
        1 => prop_oneof![Just(ServerMode::Accept), Just(ServerMode::Refuse)].prop_map(Op::Mode),
    ]
}

fn apply(sim: &Simulation, op: Op) {
    let driver = sim.driver();
    match op {
        Op::Input(event) => driver.inject_input(event),
        Op::Frame(text) => driver.inject_frame(text),
        Op::Drop => driver.inject_drop("simulated drop"),
        Op::Advance(secs) => driver.inject_advance(Duration::from_secs(secs)),
        Op::Mode(mode) => driver.set_mode(mode),
    }
}

proptest! {
    /// Standard invariants hold after every step of any script.
    #[test]
    fn prop_invariants_hold_under_arbitrary_scripts(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        let mut sim = Simulation::new(seed).unwrap();
        sim.start().unwrap();

        for op in ops {
            apply(&sim, op);
            sim.run_until_idle().unwrap();
        }
    }

    /// With the server refusing everything, opens stop at the bound and the
    /// client ends up failed.
    #[test]
    fn prop_refused_server_opens_are_bounded(advances in prop::collection::vec(1u64..10, 20..60)) {
        let mut sim = Simulation::new(0).unwrap();
        sim.driver().set_mode(ServerMode::Refuse);
        sim.start().unwrap();

        for secs in advances {
            sim.driver().inject_advance(Duration::from_secs(secs));
        }
        // Enough virtual time for every retry to come due.
        for _ in 0..6 {
            sim.driver().inject_advance(Duration::from_secs(3));
        }
        sim.run_until_idle().unwrap();

        let max_attempts = sim.client().config().reconnect.max_attempts as usize;
        prop_assert_eq!(sim.driver().opened_urls().len(), max_attempts + 1);
        prop_assert_eq!(sim.client().session().connection_status(), ConnectionStatus::Failed);
    }
}

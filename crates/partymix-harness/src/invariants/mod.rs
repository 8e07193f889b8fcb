//! Session invariants checked after every simulation step.
//!
//! A [`SessionSnapshot`] flattens the client's session, its connection
//! counters, and the persisted room record into plain values. Each
//! [`Invariant`] inspects one snapshot and reports a [`Violation`] when the
//! session has reached a state no sequence of server frames, user commands,
//! or transport failures should be able to produce.
//!
//! [`Simulation`](crate::Simulation) captures a snapshot after each runtime
//! step and hands it to an [`InvariantRegistry`]:
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SessionSnapshot::capture(&client, &storage);
//! registry.assert_all(&snapshot, "after roomJoined");
//! ```
//!
//! Scenarios that deliberately break one guarantee (for example, storage
//! that rejects writes) build a registry without the affected check.

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    AttemptsBounded, CurrentTrackMatchesQueue, LocalVoteNeedsRoom, RoomPersisted,
    VoteResetCoupling,
};
pub use snapshot::SessionSnapshot;

/// Outcome of a single check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what the snapshot showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which check failed.
    pub invariant: &'static str,
    /// The offending values.
    pub message: String,
}

impl Violation {
    /// Violation of `invariant`.
    pub fn new(invariant: &'static str, message: impl Into<String>) -> Self {
        Self { invariant, message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of a single session snapshot.
pub trait Invariant: Send + Sync {
    /// Name used in violation reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;
}

/// Ordered set of checks run against every snapshot.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session check: [`VoteResetCoupling`], [`LocalVoteNeedsRoom`],
    /// [`CurrentTrackMatchesQueue`], [`RoomPersisted`] and
    /// [`AttemptsBounded`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(VoteResetCoupling);
        registry.add(LocalVoteNeedsRoom);
        registry.add(CurrentTrackMatchesQueue);
        registry.add(RoomPersisted);
        registry.add(AttemptsBounded);
        registry
    }

    /// Register another check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.checks.push(Box::new(invariant));
    }

    /// Run every check, collecting all violations.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.checks.iter().filter_map(|check| check.check(state).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and fail the test with `context` and the snapshot if
    /// any is violated.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let report: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("session invariant broken {context}:\n  {}\n{state:#?}", report.join("\n  "));
        }
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// `true` if no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

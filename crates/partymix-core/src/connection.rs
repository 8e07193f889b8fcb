//! Transport lifecycle state machine.
//!
//! Owns connect, failure detection, bounded reconnection, and keep-alive for a
//! single WebSocket. Uses the action pattern: methods take time as input and
//! return actions for the driver to execute. Timers are deadlines stored on
//! the manager and fired from [`ConnectionManager::tick`], so at most one
//! reconnect timer can exist and every superseding transition cancels it by
//! overwriting the deadline. A handshake still pending when its deadline
//! passes is closed and counts as a failed attempt.
//!
//! # State Machine
//!
//! ```text
//!                 connect()                 opened
//! ┌──────────────┐────────>┌────────────┐─────────────>┌──────┐
//! │ Disconnected │         │ Connecting │              │ Open │
//! └──────────────┘<────────└────────────┘<──────┐      └──────┘
//!        ^      disconnect()   │    ^           │ delay     │
//!        │                     │    │           │ elapsed   │ closed / error
//!        │              closed │    │   ┌──────────────┐    │
//!        │                     └────┼──>│ Reconnecting │<───┘
//!        │                          │   └──────────────┘
//!        │        connect()/        │          │ attempts exhausted
//!        │        foreground   ┌────────┐      │
//!        └─────────────────────│ Failed │<─────┘
//!                              └────────┘
//! ```

use std::{
    fmt,
    ops::Add,
    time::{Duration, Instant},
};

/// Automatic reconnect attempts after a loss before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay before each automatic reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Interval between keep-alive frames while open.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Time allowed for a transport to open before the attempt counts as failed.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Observable connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No transport and nothing scheduled.
    #[default]
    Disconnected,
    /// Transport open requested, handshake in flight.
    Connecting,
    /// Transport open; commands may be sent.
    Open,
    /// Transport lost; a reconnect deadline is armed.
    Reconnecting,
    /// Reconnect attempts exhausted. Terminal until an explicit trigger.
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Actions returned by the connection manager.
///
/// The driver executes transport actions; the session layer reacts to the
/// lifecycle ones (`Opened`, `Rejoin`, `Lost`, `Failed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new transport to the server.
    OpenTransport,
    /// Close the current transport, if any.
    CloseTransport,
    /// Send a keep-alive frame.
    SendKeepAlive,
    /// Transport reached `Open`: announce identity and rejoin the stored room.
    Opened,
    /// Already open but the app returned to foreground: re-issue the rejoin.
    Rejoin,
    /// Transport lost; a reconnect is scheduled.
    Lost {
        /// Why the transport went away
        reason: String,
    },
    /// Reconnect attempts exhausted.
    Failed {
        /// Automatic attempts made before giving up
        attempts: u32,
    },
}

/// Delay growth between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every attempt.
    Fixed,
    /// Delay doubles per attempt, capped.
    Exponential {
        /// Upper bound on any single delay
        max_delay: Duration,
    },
}

/// Reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Automatic attempts after a loss before entering `Failed`.
    pub max_attempts: u32,
    /// Base delay before an attempt.
    pub delay: Duration,
    /// How the delay grows with the attempt number.
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-interval policy.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay, backoff: Backoff::Fixed }
    }

    /// Delay to wait before automatic attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.delay.saturating_mul(factor).min(max_delay)
            },
        }
    }
}

/// Reconnecting transport lifecycle.
///
/// Pure state machine: no I/O, no clock. Generic over the instant type so
/// simulation can drive it with virtual time.
///
/// Connecting requires a resolved client identity. A `connect()` issued
/// before [`ConnectionManager::identity_resolved`] is remembered and replayed
/// once identity is available.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I = Instant>
where
    I: Copy + Ord + fmt::Debug + Add<Duration, Output = I>,
{
    status: ConnectionStatus,
    policy: ReconnectPolicy,
    keepalive_interval: Duration,
    handshake_timeout: Duration,
    /// Automatic attempts made since the last successful open.
    attempt: u32,
    identity_ready: bool,
    connect_deferred: bool,
    reconnect_at: Option<I>,
    keepalive_at: Option<I>,
    handshake_at: Option<I>,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + fmt::Debug + Add<Duration, Output = I>,
{
    /// Create a manager in [`ConnectionStatus::Disconnected`].
    pub fn new(policy: ReconnectPolicy, keepalive_interval: Duration) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            policy,
            keepalive_interval,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            attempt: 0,
            identity_ready: false,
            connect_deferred: false,
            reconnect_at: None,
            keepalive_at: None,
            handshake_at: None,
        }
    }

    /// Replace the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// `true` while the transport is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }

    /// Automatic attempts made since the last successful open.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reconnect policy in effect.
    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Pending reconnect deadline, if one is armed.
    #[must_use]
    pub fn reconnect_deadline(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Next keep-alive deadline, if armed.
    #[must_use]
    pub fn keepalive_deadline(&self) -> Option<I> {
        self.keepalive_at
    }

    /// Deadline for the in-flight handshake, if one is armed.
    #[must_use]
    pub fn handshake_deadline(&self) -> Option<I> {
        self.handshake_at
    }

    /// Earliest armed deadline. Drivers may sleep until then before ticking.
    #[must_use]
    pub fn next_deadline(&self) -> Option<I> {
        [self.reconnect_at, self.keepalive_at, self.handshake_at].into_iter().flatten().min()
    }

    /// `true` if a `connect()` is waiting on identity.
    #[must_use]
    pub fn is_connect_deferred(&self) -> bool {
        self.connect_deferred
    }

    /// Client identity is available; replays a deferred `connect()`.
    pub fn identity_resolved(&mut self, now: I) -> Vec<ConnectionAction> {
        self.identity_ready = true;
        if std::mem::take(&mut self.connect_deferred) {
            tracing::debug!("identity resolved, replaying deferred connect");
            self.connect(now)
        } else {
            Vec::new()
        }
    }

    /// Explicit connect request.
    ///
    /// No-op while a transport is open or in flight. From any other state it
    /// cancels a pending reconnect, resets the attempt counter, and opens a
    /// fresh transport.
    pub fn connect(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.status {
            ConnectionStatus::Open | ConnectionStatus::Connecting => {
                tracing::debug!(status = %self.status, "connect ignored, transport already live");
                Vec::new()
            },
            ConnectionStatus::Disconnected
            | ConnectionStatus::Reconnecting
            | ConnectionStatus::Failed => {
                if !self.identity_ready {
                    tracing::debug!("connect deferred until identity resolves");
                    self.connect_deferred = true;
                    return Vec::new();
                }
                self.attempt = 0;
                self.reconnect_at = None;
                self.begin_handshake(now);
                vec![ConnectionAction::OpenTransport]
            },
        }
    }

    /// App returned to foreground.
    ///
    /// Re-issues the rejoin when open, otherwise forces a fresh connect cycle.
    pub fn foreground(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.status {
            ConnectionStatus::Open => vec![ConnectionAction::Rejoin],
            _ => self.connect(now),
        }
    }

    /// Transport handshake completed.
    ///
    /// A transport that opens while nothing was requested is closed again.
    pub fn transport_opened(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.status != ConnectionStatus::Connecting {
            tracing::warn!(status = %self.status, "unexpected transport open, closing it");
            return vec![ConnectionAction::CloseTransport];
        }

        tracing::info!(attempt = self.attempt, "connection open");
        self.status = ConnectionStatus::Open;
        self.attempt = 0;
        self.reconnect_at = None;
        self.handshake_at = None;
        self.keepalive_at = Some(now + self.keepalive_interval);
        vec![ConnectionAction::Opened]
    }

    /// Transport closed, failed to open, or errored.
    ///
    /// Ignored unless a transport was open or in flight.
    pub fn transport_closed(&mut self, now: I, reason: &str) -> Vec<ConnectionAction> {
        match self.status {
            ConnectionStatus::Connecting | ConnectionStatus::Open => {
                self.keepalive_at = None;
                self.schedule_reconnect(now, reason)
            },
            status => {
                tracing::debug!(%status, reason, "stale transport close ignored");
                Vec::new()
            },
        }
    }

    /// Fire due deadlines.
    ///
    /// `transport_open` is the driver's view of the socket. A keep-alive that
    /// finds it closed routes to `Reconnecting` instead of sending, and so
    /// does a handshake still pending at its deadline.
    pub fn tick(&mut self, now: I, transport_open: bool) -> Vec<ConnectionAction> {
        match self.status {
            ConnectionStatus::Reconnecting => match self.reconnect_at {
                Some(deadline) if deadline <= now => {
                    self.reconnect_at = None;
                    self.attempt += 1;
                    self.begin_handshake(now);
                    tracing::info!(
                        attempt = self.attempt,
                        max_attempts = self.policy.max_attempts,
                        "reconnecting"
                    );
                    vec![ConnectionAction::OpenTransport]
                },
                _ => Vec::new(),
            },
            ConnectionStatus::Open => match self.keepalive_at {
                Some(deadline) if deadline <= now => {
                    if transport_open {
                        self.keepalive_at = Some(now + self.keepalive_interval);
                        vec![ConnectionAction::SendKeepAlive]
                    } else {
                        self.keepalive_at = None;
                        let mut actions = vec![ConnectionAction::CloseTransport];
                        actions.extend(self.schedule_reconnect(now, "keep-alive found transport closed"));
                        actions
                    }
                },
                _ => Vec::new(),
            },
            ConnectionStatus::Connecting => match self.handshake_at {
                Some(deadline) if deadline <= now => {
                    tracing::warn!(timeout = ?self.handshake_timeout, "handshake timed out");
                    let mut actions = vec![ConnectionAction::CloseTransport];
                    actions.extend(self.schedule_reconnect(now, "handshake timed out"));
                    actions
                },
                _ => Vec::new(),
            },
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => Vec::new(),
        }
    }

    /// Explicit teardown. Cancels every timer.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let live = matches!(self.status, ConnectionStatus::Connecting | ConnectionStatus::Open);
        self.status = ConnectionStatus::Disconnected;
        self.attempt = 0;
        self.connect_deferred = false;
        self.reconnect_at = None;
        self.keepalive_at = None;
        self.handshake_at = None;

        if live { vec![ConnectionAction::CloseTransport] } else { Vec::new() }
    }

    fn begin_handshake(&mut self, now: I) {
        self.status = ConnectionStatus::Connecting;
        self.handshake_at = Some(now + self.handshake_timeout);
    }

    fn schedule_reconnect(&mut self, now: I, reason: &str) -> Vec<ConnectionAction> {
        self.handshake_at = None;
        if self.attempt >= self.policy.max_attempts {
            tracing::warn!(attempts = self.attempt, reason, "reconnect attempts exhausted");
            self.status = ConnectionStatus::Failed;
            self.reconnect_at = None;
            return vec![ConnectionAction::Failed { attempts: self.attempt }];
        }

        let delay = self.policy.delay_for_attempt(self.attempt + 1);
        tracing::info!(attempt = self.attempt, ?delay, reason, "connection lost, scheduling reconnect");
        self.status = ConnectionStatus::Reconnecting;
        self.reconnect_at = Some(now + delay);

        // Only the first loss of a cycle is surfaced; retries show up as status.
        if self.attempt == 0 {
            vec![ConnectionAction::Lost { reason: reason.to_owned() }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            ReconnectPolicy::fixed(DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY),
            DEFAULT_KEEPALIVE_INTERVAL,
        )
    }

    fn open_manager(t0: Instant) -> ConnectionManager {
        let mut conn = manager();
        conn.identity_resolved(t0);
        conn.connect(t0);
        conn.transport_opened(t0);
        conn
    }

    #[test]
    fn connect_before_identity_is_deferred() {
        let t0 = Instant::now();
        let mut conn = manager();

        assert!(conn.connect(t0).is_empty());
        assert!(conn.is_connect_deferred());
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);

        let actions = conn.identity_resolved(t0);
        assert_eq!(actions, vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn connect_while_open_is_noop() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        assert!(conn.connect(t0).is_empty());
        assert_eq!(conn.status(), ConnectionStatus::Open);
    }

    #[test]
    fn connect_while_connecting_is_noop() {
        let t0 = Instant::now();
        let mut conn = manager();
        conn.identity_resolved(t0);

        assert_eq!(conn.connect(t0), vec![ConnectionAction::OpenTransport]);
        assert!(conn.connect(t0).is_empty());
    }

    #[test]
    fn open_arms_keepalive_and_announces() {
        let t0 = Instant::now();
        let mut conn = manager();
        conn.identity_resolved(t0);
        conn.connect(t0);

        assert_eq!(conn.transport_opened(t0), vec![ConnectionAction::Opened]);
        assert_eq!(conn.keepalive_deadline(), Some(t0 + DEFAULT_KEEPALIVE_INTERVAL));
        assert_eq!(conn.reconnect_deadline(), None);
    }

    #[test]
    fn unexpected_open_is_closed() {
        let t0 = Instant::now();
        let mut conn = manager();

        assert_eq!(conn.transport_opened(t0), vec![ConnectionAction::CloseTransport]);
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn keepalive_fires_on_interval() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        assert!(conn.tick(t0 + Duration::from_secs(29), true).is_empty());

        let t1 = t0 + DEFAULT_KEEPALIVE_INTERVAL;
        assert_eq!(conn.tick(t1, true), vec![ConnectionAction::SendKeepAlive]);
        assert_eq!(conn.keepalive_deadline(), Some(t1 + DEFAULT_KEEPALIVE_INTERVAL));
    }

    #[test]
    fn keepalive_on_dead_transport_reconnects() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        let t1 = t0 + DEFAULT_KEEPALIVE_INTERVAL;
        let actions = conn.tick(t1, false);

        assert_eq!(actions[0], ConnectionAction::CloseTransport);
        assert!(matches!(actions[1], ConnectionAction::Lost { .. }));
        assert!(!actions.contains(&ConnectionAction::SendKeepAlive));
        assert_eq!(conn.status(), ConnectionStatus::Reconnecting);
        assert_eq!(conn.keepalive_deadline(), None);
    }

    #[test]
    fn loss_schedules_single_reconnect() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        let actions = conn.transport_closed(t0, "reset by peer");
        assert_eq!(actions, vec![ConnectionAction::Lost { reason: "reset by peer".into() }]);
        assert_eq!(conn.reconnect_deadline(), Some(t0 + DEFAULT_RECONNECT_DELAY));

        // Not due yet
        assert!(conn.tick(t0 + Duration::from_secs(1), false).is_empty());

        let actions = conn.tick(t0 + DEFAULT_RECONNECT_DELAY, false);
        assert_eq!(actions, vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.attempt(), 1);
        assert_eq!(conn.reconnect_deadline(), None);
    }

    #[test]
    fn exhausting_attempts_fails_until_explicit_trigger() {
        let mut now = Instant::now();
        let mut conn = manager();
        conn.identity_resolved(now);

        let mut opens = conn.connect(now).len();
        let mut failed = None;

        while failed.is_none() {
            for action in conn.transport_closed(now, "refused") {
                if let ConnectionAction::Failed { attempts } = action {
                    failed = Some(attempts);
                }
            }
            now += DEFAULT_RECONNECT_DELAY;
            opens += conn
                .tick(now, false)
                .iter()
                .filter(|a| **a == ConnectionAction::OpenTransport)
                .count();
        }

        assert_eq!(failed, Some(DEFAULT_MAX_RECONNECT_ATTEMPTS));
        assert_eq!(opens, DEFAULT_MAX_RECONNECT_ATTEMPTS as usize + 1);
        assert_eq!(conn.status(), ConnectionStatus::Failed);

        // Terminal: time alone does nothing
        assert!(conn.tick(now + Duration::from_secs(3600), false).is_empty());

        // Foreground re-enters Connecting with a fresh counter
        assert_eq!(conn.foreground(now), vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.attempt(), 0);
    }

    #[test]
    fn successful_open_resets_attempts() {
        let mut now = Instant::now();
        let mut conn = open_manager(now);

        conn.transport_closed(now, "drop");
        now += DEFAULT_RECONNECT_DELAY;
        conn.tick(now, false);
        conn.transport_closed(now, "refused");
        now += DEFAULT_RECONNECT_DELAY;
        conn.tick(now, false);
        assert_eq!(conn.attempt(), 2);

        conn.transport_opened(now);
        assert_eq!(conn.attempt(), 0);
    }

    #[test]
    fn foreground_while_reconnecting_cancels_timer() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);
        conn.transport_closed(t0, "drop");
        assert!(conn.reconnect_deadline().is_some());

        assert_eq!(conn.foreground(t0), vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.reconnect_deadline(), None);

        // The superseded deadline never fires
        assert!(conn.tick(t0 + DEFAULT_RECONNECT_DELAY, false).is_empty());
    }

    #[test]
    fn stalled_handshake_times_out_into_reconnect() {
        let t0 = Instant::now();
        let mut conn = manager();
        conn.identity_resolved(t0);
        conn.connect(t0);
        assert_eq!(conn.handshake_deadline(), Some(t0 + DEFAULT_HANDSHAKE_TIMEOUT));
        assert_eq!(conn.next_deadline(), conn.handshake_deadline());

        assert!(conn.tick(t0 + Duration::from_secs(29), false).is_empty());

        let t1 = t0 + DEFAULT_HANDSHAKE_TIMEOUT;
        let actions = conn.tick(t1, false);
        assert_eq!(actions[0], ConnectionAction::CloseTransport);
        assert!(matches!(actions[1], ConnectionAction::Lost { .. }));
        assert_eq!(conn.status(), ConnectionStatus::Reconnecting);
        assert_eq!(conn.handshake_deadline(), None);

        // The retry gets a fresh handshake deadline
        let t2 = t1 + DEFAULT_RECONNECT_DELAY;
        assert_eq!(conn.tick(t2, false), vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.handshake_deadline(), Some(t2 + DEFAULT_HANDSHAKE_TIMEOUT));
    }

    #[test]
    fn handshakes_that_never_finish_reach_failed() {
        let mut now = Instant::now();
        let mut conn = manager().with_handshake_timeout(Duration::from_secs(5));
        conn.identity_resolved(now);
        conn.connect(now);

        for _ in 0..=DEFAULT_MAX_RECONNECT_ATTEMPTS {
            now += Duration::from_secs(5);
            conn.tick(now, false);
            now += DEFAULT_RECONNECT_DELAY;
            conn.tick(now, false);
        }

        assert_eq!(conn.status(), ConnectionStatus::Failed);
        assert_eq!(conn.next_deadline(), None);
    }

    #[test]
    fn open_disarms_handshake_deadline() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        assert_eq!(conn.handshake_deadline(), None);
        let actions = conn.tick(t0 + DEFAULT_HANDSHAKE_TIMEOUT, true);
        assert_eq!(actions, vec![ConnectionAction::SendKeepAlive]);
        assert_eq!(conn.status(), ConnectionStatus::Open);
    }

    #[test]
    fn foreground_while_open_rejoins() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        assert_eq!(conn.foreground(t0), vec![ConnectionAction::Rejoin]);
    }

    #[test]
    fn disconnect_cancels_everything() {
        let t0 = Instant::now();
        let mut conn = open_manager(t0);

        assert_eq!(conn.disconnect(), vec![ConnectionAction::CloseTransport]);
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
        assert_eq!(conn.next_deadline(), None);

        // Late close from the torn-down transport is stale
        assert!(conn.transport_closed(t0, "closed").is_empty());
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            backoff: Backoff::Exponential { max_delay: Duration::from_secs(10) },
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_secs(10));
    }
}

//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as `TerminalDriver` but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`partymix_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! The driver plays a scripted server: every `open` is answered according to
//! the current [`ServerMode`], and socket events for a transport that has
//! since been closed are discarded, the way a real transport's callbacks
//! stop once it is torn down.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use partymix_app::{AppEvent, Driver, DriverEvent, SocketEvent};
use partymix_client::{Notice, SessionState};
use partymix_core::Environment;

use crate::{SimEnv, SimInstant, invariants::SessionSnapshot};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// How the simulated server answers a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Complete the handshake.
    #[default]
    Accept,
    /// Fail the handshake.
    Refuse,
    /// Leave the handshake pending until the test resolves it.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    None,
    Pending,
    Open,
}

#[derive(Debug)]
enum Scripted {
    Event(DriverEvent),
    Advance(Duration),
}

/// Shared state for event injection.
///
/// This allows injection from outside async contexts.
#[derive(Debug)]
struct SharedState {
    script: VecDeque<Scripted>,
    socket: VecDeque<SocketEvent>,
    mode: ServerMode,
    transport: Transport,
    opened_urls: Vec<String>,
    sent: Vec<String>,
    published: Vec<SessionSnapshot>,
    notices: Vec<Notice>,
    stopped: bool,
}

impl SharedState {
    fn next(&mut self, env: &SimEnv) -> Option<DriverEvent> {
        loop {
            if let Some(event) = self.socket.pop_front() {
                match &event {
                    SocketEvent::Opened => self.transport = Transport::Open,
                    SocketEvent::Closed { .. } => self.transport = Transport::None,
                    SocketEvent::Frame(_) => {},
                }
                return Some(event.into());
            }

            match self.script.pop_front()? {
                Scripted::Advance(by) => {
                    env.advance(by);
                    return Some(DriverEvent::Tick);
                },
                Scripted::Event(DriverEvent::Socket(event)) => self.deliver(event),
                Scripted::Event(event) => return Some(event),
            }
        }
    }

    /// Route a scripted socket event through the transport it belongs to.
    fn deliver(&mut self, event: SocketEvent) {
        let deliverable = match &event {
            SocketEvent::Opened => self.transport == Transport::Pending,
            SocketEvent::Closed { .. } => self.transport != Transport::None,
            SocketEvent::Frame(_) => self.transport == Transport::Open,
        };

        if deliverable {
            self.socket.push_back(event);
        } else {
            tracing::debug!(?event, transport = ?self.transport, "dropping stale socket event");
        }
    }
}

/// Simulation driver for deterministic testing.
///
/// Clones share state, so a test can keep a clone to inject events and
/// inspect recorded I/O while [`partymix_app::Runtime`] owns the other.
#[derive(Clone)]
pub struct SimDriver {
    env: SimEnv,
    state: Arc<Mutex<SharedState>>,
}

impl SimDriver {
    /// Create a driver reading time from `env`.
    pub fn new(env: SimEnv) -> Self {
        let state = SharedState {
            script: VecDeque::new(),
            socket: VecDeque::new(),
            mode: ServerMode::default(),
            transport: Transport::None,
            opened_urls: Vec::new(),
            sent: Vec::new(),
            published: Vec::new(),
            notices: Vec::new(),
            stopped: false,
        };
        Self { env, state: Arc::new(Mutex::new(state)) }
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set how future connection attempts are answered.
    pub fn set_mode(&self, mode: ServerMode) {
        self.state().mode = mode;
    }

    /// Queue a user intent.
    pub fn inject_input(&self, event: AppEvent) {
        self.state().script.push_back(Scripted::Event(event.into()));
    }

    /// Queue a frame from the server. Dropped if no transport is open when
    /// it comes up.
    pub fn inject_frame(&self, text: impl Into<String>) {
        let event = SocketEvent::Frame(text.into()).into();
        self.state().script.push_back(Scripted::Event(event));
    }

    /// Queue a server-side close of the current transport.
    pub fn inject_drop(&self, reason: impl Into<String>) {
        let event = SocketEvent::Closed { reason: reason.into() }.into();
        self.state().script.push_back(Scripted::Event(event));
    }

    /// Queue completion of a held handshake.
    pub fn inject_open(&self) {
        self.state().script.push_back(Scripted::Event(SocketEvent::Opened.into()));
    }

    /// Queue a clock advance. Delivered as a tick after the clock moves.
    pub fn inject_advance(&self, by: Duration) {
        self.state().script.push_back(Scripted::Advance(by));
    }

    /// Queue a bare tick.
    pub fn inject_tick(&self) {
        self.state().script.push_back(Scripted::Event(DriverEvent::Tick));
    }

    /// Next event, synchronously. `None` when the script is exhausted.
    pub fn poll_next(&self) -> Option<DriverEvent> {
        self.state().next(&self.env)
    }

    /// Check if there are pending events to process.
    pub fn has_pending(&self) -> bool {
        let state = self.state();
        !state.script.is_empty() || !state.socket.is_empty()
    }

    /// URLs passed to every `open`, in order.
    pub fn opened_urls(&self) -> Vec<String> {
        self.state().opened_urls.clone()
    }

    /// Take all captured outgoing frames.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.state().sent)
    }

    /// Every published session, in order.
    pub fn published(&self) -> Vec<SessionSnapshot> {
        self.state().published.clone()
    }

    /// Every surfaced notice, in order.
    pub fn notices(&self) -> Vec<Notice> {
        self.state().notices.clone()
    }

    /// `true` once [`Driver::stop`] ran.
    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }

    /// The environment this driver reads time from.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    fn next_event(&mut self) -> impl Future<Output = Result<Option<DriverEvent>, Self::Error>> + Send {
        let event = self.poll_next();
        async move { Ok(event) }
    }

    fn open(&mut self, url: &str) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.opened_urls.push(url.to_owned());
        state.transport = Transport::Pending;
        // Events from the replaced transport never arrive.
        state.socket.clear();

        match state.mode {
            ServerMode::Accept => state.socket.push_back(SocketEvent::Opened),
            ServerMode::Refuse => {
                state.socket.push_back(SocketEvent::Closed { reason: "connection refused".into() });
            },
            ServerMode::Hold => {},
        }
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), Self::Error> {
        let mut state = self.state();
        if state.transport != Transport::Open {
            return Err(SimDriverError("transport is not open".into()));
        }
        state.sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.transport = Transport::None;
        state.socket.clear();
    }

    fn is_open(&self) -> bool {
        self.state().transport == Transport::Open
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn publish(&mut self, session: &SessionState) -> Result<(), Self::Error> {
        self.state().published.push(SessionSnapshot::from_session(session));
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) -> Result<(), Self::Error> {
        self.state().notices.push(notice.clone());
        Ok(())
    }

    fn stop(&mut self) {
        self.state().stopped = true;
    }
}

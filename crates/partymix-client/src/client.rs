//! Session client: state container plus command API.
//!
//! Owns the [`ConnectionManager`], the [`SessionState`], and the identity.
//! Every entry point returns the actions the caller must execute, ending with
//! a single [`ClientAction::SessionChanged`] when anything observable moved.

use partymix_core::{ConnectionAction, ConnectionManager, Environment};
use partymix_proto::{ClientMessage, RoomCode};

use crate::{
    ClientAction, ClientConfig, ClientError, ClientEvent, ClientIdentity, IdentityStore, Notice,
    NoticeKind, SessionState, dispatcher,
    storage::{ROOM_CODE_KEY, Storage},
};

/// Action-based session client.
///
/// Commands are silent no-ops while the transport is not open, and commands
/// that name a room are no-ops while no room is joined. Nothing is queued for
/// later delivery.
pub struct Client<E: Environment, S: Storage> {
    env: E,
    storage: S,
    config: ClientConfig,
    identity_store: IdentityStore<S>,
    identity: Option<ClientIdentity>,
    connection: ConnectionManager<E::Instant>,
    session: SessionState,
    /// Observable state changed since the last returned batch.
    dirty: bool,
}

impl<E: Environment, S: Storage> Client<E, S> {
    /// Create a client. Restores the persisted room code, if any.
    pub fn new(env: E, storage: S, config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let room_code = match storage.load(ROOM_CODE_KEY) {
            Ok(stored) => stored.map(RoomCode::new).filter(|code| !code.is_empty()),
            Err(error) => {
                tracing::warn!(%error, "failed to read persisted room, starting without one");
                None
            },
        };
        if let Some(code) = &room_code {
            tracing::info!(room_code = %code, "restored room from previous session");
        }

        let connection = ConnectionManager::new(config.reconnect, config.keepalive_interval)
            .with_handshake_timeout(config.handshake_timeout);
        let session = SessionState { room_code, ..SessionState::default() };

        Ok(Self {
            env,
            identity_store: IdentityStore::new(storage.clone()),
            storage,
            config,
            identity: None,
            connection,
            session,
            dirty: false,
        })
    }

    /// Observable session state.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Client identity, once resolved.
    #[must_use]
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// `true` if the identity has been persisted.
    #[must_use]
    pub fn is_identity_durable(&self) -> bool {
        self.identity_store.is_durable()
    }

    /// Connection lifecycle.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<E::Instant> {
        &self.connection
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Environment handle.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Resolve the client identity and replay a deferred connect.
    pub fn resolve_identity(&mut self) -> Vec<ClientAction> {
        let identity = self.identity_store.get_or_create(&self.env);
        tracing::debug!(client_id = %identity, "identity resolved");
        self.identity = Some(identity);

        let now = self.env.now();
        let actions = self.connection.identity_resolved(now);
        let actions = self.run_connection(actions);
        self.finish(actions)
    }

    /// Process an event.
    pub fn handle(&mut self, event: ClientEvent<E::Instant>) -> Vec<ClientAction> {
        let actions = match event {
            ClientEvent::Connect { now } => {
                let actions = self.connection.connect(now);
                self.run_connection(actions)
            },
            ClientEvent::Disconnect => {
                let actions = self.connection.disconnect();
                self.run_connection(actions)
            },
            ClientEvent::Foreground { now } => {
                let actions = self.connection.foreground(now);
                self.run_connection(actions)
            },
            ClientEvent::TransportOpened { now } => {
                let actions = self.connection.transport_opened(now);
                self.run_connection(actions)
            },
            ClientEvent::TransportClosed { now, reason } => {
                let actions = self.connection.transport_closed(now, &reason);
                self.run_connection(actions)
            },
            ClientEvent::FrameReceived(raw) => self.on_frame(&raw),
            ClientEvent::Tick { now, transport_open } => {
                let actions = self.connection.tick(now, transport_open);
                self.run_connection(actions)
            },
        };
        self.finish(actions)
    }

    /// Ask the server to create a room. The code arrives as `roomCreated`.
    pub fn create_room(&mut self) -> Vec<ClientAction> {
        let Some(client_id) = self.open_client_id("createRoom") else {
            return Vec::new();
        };
        vec![ClientAction::Send(ClientMessage::CreateRoom { client_id })]
    }

    /// Ask to join `code`. `room_code` is only set once the server confirms.
    pub fn join_room(&mut self, code: RoomCode) -> Vec<ClientAction> {
        if code.is_empty() {
            tracing::debug!("joinRoom dropped, empty room code");
            return Vec::new();
        }
        let Some(client_id) = self.open_client_id("joinRoom") else {
            return Vec::new();
        };
        vec![ClientAction::Send(ClientMessage::JoinRoom { room_id: code, client_id })]
    }

    /// Leave the current room. Clears the room locally without waiting for
    /// the server.
    pub fn leave_room(&mut self) -> Vec<ClientAction> {
        let Some((client_id, room_code)) = self.open_room("leaveRoom") else {
            return Vec::new();
        };
        tracing::info!(%room_code, "leaving room");

        self.session.leave_room();
        self.persist_room();
        self.dirty = true;

        let actions = vec![ClientAction::Send(ClientMessage::LeaveRoom { client_id })];
        self.finish(actions)
    }

    /// Submit a track link. The URL is forwarded as-is.
    pub fn submit_track(&mut self, url: impl Into<String>) -> Vec<ClientAction> {
        let Some((client_id, room_code)) = self.open_room("sendSong") else {
            return Vec::new();
        };
        vec![ClientAction::Send(ClientMessage::SendSong {
            room_code,
            soundcloud_url: url.into(),
            client_id,
        })]
    }

    /// Toggle this client's skip vote.
    pub fn cast_vote(&mut self) -> Vec<ClientAction> {
        let Some((client_id, room_code)) = self.open_room("vote") else {
            return Vec::new();
        };

        let vote = !self.session.has_voted_locally;
        self.session.has_voted_locally = vote;
        self.dirty = true;

        let actions = vec![ClientAction::Send(ClientMessage::Vote { room_code, vote, client_id })];
        self.finish(actions)
    }

    /// Ask the server to re-broadcast the queue.
    pub fn request_refresh(&mut self) -> Vec<ClientAction> {
        let Some((client_id, room_code)) = self.open_room("refreshQueue") else {
            return Vec::new();
        };
        vec![ClientAction::Send(ClientMessage::RefreshQueue { room_code, client_id })]
    }

    fn run_connection(&mut self, actions: Vec<ConnectionAction>) -> Vec<ClientAction> {
        let mut out = Vec::new();
        for action in actions {
            match action {
                ConnectionAction::OpenTransport => out.push(ClientAction::OpenTransport {
                    url: self.config.server_url.clone(),
                }),
                ConnectionAction::CloseTransport => out.push(ClientAction::CloseTransport),
                ConnectionAction::SendKeepAlive => {
                    out.push(ClientAction::Send(ClientMessage::Heartbeat));
                },
                ConnectionAction::Opened => {
                    if let Some(identity) = &self.identity {
                        out.push(ClientAction::Send(ClientMessage::ClientInfo {
                            client_id: identity.to_string(),
                        }));
                    }
                    out.extend(self.rejoin());
                },
                ConnectionAction::Rejoin => out.extend(self.rejoin()),
                ConnectionAction::Lost { reason } => {
                    out.push(ClientAction::Notice(Notice::new(
                        NoticeKind::ConnectionLost,
                        format!("Connection lost ({reason}), reconnecting"),
                    )));
                },
                ConnectionAction::Failed { attempts } => {
                    out.push(ClientAction::Notice(Notice::new(
                        NoticeKind::ConnectionFailed,
                        format!("Could not reach the server after {attempts} retries"),
                    )));
                },
            }
        }
        out
    }

    fn rejoin(&self) -> Option<ClientAction> {
        let room_id = self.session.room_code.clone()?;
        let client_id = self.identity.as_ref()?.to_string();
        tracing::info!(%room_id, "rejoining room");
        Some(ClientAction::Send(ClientMessage::JoinRoom { room_id, client_id }))
    }

    fn on_frame(&mut self, raw: &str) -> Vec<ClientAction> {
        let dispatch = dispatcher::on_frame(raw, &mut self.session);
        self.dirty |= dispatch.changed;
        if dispatch.room_changed {
            self.persist_room();
        }

        let mut actions = Vec::new();
        if let Some(room_id) = dispatch.join {
            if let Some(client_id) = self.open_client_id("joinRoom") {
                actions.push(ClientAction::Send(ClientMessage::JoinRoom { room_id, client_id }));
            }
        }
        if let Some(notice) = dispatch.notice {
            actions.push(ClientAction::Notice(notice));
        }
        actions
    }

    /// Write `room_code` through to storage: store when set, delete when
    /// cleared.
    fn persist_room(&self) {
        let result = match &self.session.room_code {
            Some(code) => self.storage.store(ROOM_CODE_KEY, code.as_str()),
            None => self.storage.remove(ROOM_CODE_KEY),
        };
        if let Err(error) = result {
            tracing::warn!(%error, "failed to persist room code, it will not survive a restart");
        }
    }

    fn open_client_id(&self, command: &'static str) -> Option<String> {
        if !self.connection.is_open() {
            tracing::debug!(command, status = %self.connection.status(), "command dropped, not connected");
            return None;
        }
        self.identity.as_ref().map(ToString::to_string)
    }

    fn open_room(&self, command: &'static str) -> Option<(String, RoomCode)> {
        let client_id = self.open_client_id(command)?;
        match &self.session.room_code {
            Some(code) => Some((client_id, code.clone())),
            None => {
                tracing::debug!(command, "command dropped, not in a room");
                None
            },
        }
    }

    /// Mirror the connection status and append the change marker.
    fn finish(&mut self, mut actions: Vec<ClientAction>) -> Vec<ClientAction> {
        let status = self.connection.status();
        if self.session.connection_status != status {
            self.session.connection_status = status;
            self.dirty = true;
        }
        if std::mem::take(&mut self.dirty) {
            actions.push(ClientAction::SessionChanged);
        }
        actions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{Duration, Instant};

    use partymix_core::{ConnectionStatus, ReconnectPolicy};

    use super::*;
    use crate::{MemoryStorage, storage::CLIENT_ID_KEY};

    #[derive(Clone)]
    struct TestEnv {
        start: Instant,
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.start
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(7);
        }
    }

    fn client(storage: MemoryStorage) -> Client<TestEnv, MemoryStorage> {
        let config = ClientConfig {
            server_url: "wss://test.invalid:8080".into(),
            reconnect: ReconnectPolicy::fixed(2, Duration::from_secs(1)),
            ..ClientConfig::default()
        };
        Client::new(TestEnv { start: Instant::now() }, storage, config).unwrap()
    }

    fn open_client(storage: MemoryStorage) -> Client<TestEnv, MemoryStorage> {
        let mut client = client(storage);
        let now = client.env().now();
        client.resolve_identity();
        client.handle(ClientEvent::Connect { now });
        client.handle(ClientEvent::TransportOpened { now });
        client
    }

    fn sent(actions: &[ClientAction]) -> Vec<&ClientMessage> {
        actions
            .iter()
            .filter_map(|a| match a {
                ClientAction::Send(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn joined_client() -> Client<TestEnv, MemoryStorage> {
        let mut client = open_client(MemoryStorage::new());
        client.handle(ClientEvent::FrameReceived(
            r#"{"type":"roomJoined","roomCode":"4821","queue":[]}"#.into(),
        ));
        client
    }

    #[test]
    fn connect_waits_for_identity() {
        let mut client = client(MemoryStorage::new());
        let now = client.env().now();

        assert_eq!(client.handle(ClientEvent::Connect { now }), Vec::new());

        let actions = client.resolve_identity();
        assert_eq!(actions, vec![
            ClientAction::OpenTransport { url: "wss://test.invalid:8080".into() },
            ClientAction::SessionChanged,
        ]);
        assert_eq!(client.session().connection_status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn open_announces_then_rejoins_persisted_room() {
        let storage = MemoryStorage::new();
        storage.store(ROOM_CODE_KEY, "4821").unwrap();
        let mut client = client(storage.clone());
        let now = client.env().now();

        client.resolve_identity();
        client.handle(ClientEvent::Connect { now });
        let actions = client.handle(ClientEvent::TransportOpened { now });

        let client_id = storage.load(CLIENT_ID_KEY).unwrap().unwrap();
        assert_eq!(sent(&actions), vec![
            &ClientMessage::ClientInfo { client_id: client_id.clone() },
            &ClientMessage::JoinRoom { room_id: "4821".into(), client_id },
        ]);
        assert_eq!(actions.last(), Some(&ClientAction::SessionChanged));
    }

    #[test]
    fn open_without_room_only_announces() {
        let mut client = client(MemoryStorage::new());
        let now = client.env().now();
        client.resolve_identity();
        client.handle(ClientEvent::Connect { now });

        let actions = client.handle(ClientEvent::TransportOpened { now });
        assert_eq!(sent(&actions).len(), 1);
        assert!(matches!(sent(&actions)[0], ClientMessage::ClientInfo { .. }));
    }

    #[test]
    fn commands_are_dropped_while_not_open() {
        let storage = MemoryStorage::new();
        storage.store(ROOM_CODE_KEY, "4821").unwrap();
        let mut client = client(storage);
        client.resolve_identity();

        assert!(client.submit_track("https://soundcloud.com/a/b").is_empty());
        assert!(client.create_room().is_empty());
        assert!(client.join_room("1".into()).is_empty());
        assert!(client.cast_vote().is_empty());
        assert!(client.request_refresh().is_empty());
        assert!(client.leave_room().is_empty());
        assert_eq!(client.session().room_code(), Some(&RoomCode::new("4821")));
    }

    #[test]
    fn room_commands_need_a_room() {
        let mut client = open_client(MemoryStorage::new());

        assert!(client.submit_track("x").is_empty());
        assert!(client.cast_vote().is_empty());
        assert!(client.request_refresh().is_empty());
        assert_eq!(sent(&client.create_room()).len(), 1);
    }

    #[test]
    fn vote_after_lost_room_starts_fresh() {
        let mut client = joined_client();
        client.cast_vote();
        assert!(client.session().has_voted_locally());

        client.handle(ClientEvent::FrameReceived(r#"{"error":"Room not found"}"#.into()));
        assert_eq!(client.session().room_code(), None);
        assert!(!client.session().has_voted_locally());

        client.handle(ClientEvent::FrameReceived(
            r#"{"type":"roomJoined","roomCode":"2222","queue":[]}"#.into(),
        ));
        let actions = client.cast_vote();

        assert!(matches!(
            sent(&actions)[..],
            [ClientMessage::Vote { room_code, vote: true, .. }] if room_code.as_str() == "2222"
        ));
    }

    #[test]
    fn join_waits_for_server_confirmation() {
        let mut client = open_client(MemoryStorage::new());

        let actions = client.join_room("77".into());
        assert_eq!(sent(&actions).len(), 1);
        assert_eq!(client.session().room_code(), None);
    }

    #[test]
    fn room_created_persists_and_joins() {
        let storage = MemoryStorage::new();
        let mut client = open_client(storage.clone());

        let actions = client
            .handle(ClientEvent::FrameReceived(r#"{"type":"roomCreated","roomCode":"9"}"#.into()));

        assert!(matches!(sent(&actions).as_slice(), [ClientMessage::JoinRoom { room_id, .. }] if room_id.as_str() == "9"));
        assert_eq!(storage.load(ROOM_CODE_KEY).unwrap().as_deref(), Some("9"));
    }

    #[test]
    fn room_not_found_deletes_persisted_room() {
        let storage = MemoryStorage::new();
        storage.store(ROOM_CODE_KEY, "4821").unwrap();
        let mut client = open_client(storage.clone());

        let actions = client.handle(ClientEvent::FrameReceived(r#"{"error":"Room not found"}"#.into()));

        assert_eq!(client.session().room_code(), None);
        assert_eq!(storage.load(ROOM_CODE_KEY).unwrap(), None);
        assert!(actions.iter().any(
            |a| matches!(a, ClientAction::Notice(n) if n.kind == NoticeKind::RoomNotFound)
        ));
    }

    #[test]
    fn vote_toggles_local_flag() {
        let mut client = joined_client();

        let first = client.cast_vote();
        assert!(matches!(sent(&first)[0], ClientMessage::Vote { vote: true, .. }));
        assert!(client.session().has_voted_locally());

        let second = client.cast_vote();
        assert!(matches!(sent(&second)[0], ClientMessage::Vote { vote: false, .. }));
        assert!(!client.session().has_voted_locally());
    }

    #[test]
    fn leave_clears_room_immediately() {
        let mut client = joined_client();

        let actions = client.leave_room();
        assert!(matches!(sent(&actions)[0], ClientMessage::LeaveRoom { .. }));
        assert_eq!(client.session().room_code(), None);
        assert_eq!(client.storage.load(ROOM_CODE_KEY).unwrap(), None);
    }

    #[test]
    fn foreground_while_open_rejoins() {
        let mut client = joined_client();
        let now = client.env().now();

        let actions = client.handle(ClientEvent::Foreground { now });
        assert!(matches!(sent(&actions).as_slice(), [ClientMessage::JoinRoom { .. }]));
    }

    #[test]
    fn keepalive_sends_heartbeat() {
        let mut client = open_client(MemoryStorage::new());
        let now = client.env().now() + client.config().keepalive_interval;

        let actions = client.handle(ClientEvent::Tick { now, transport_open: true });
        assert_eq!(actions, vec![ClientAction::Send(ClientMessage::Heartbeat)]);
    }

    #[test]
    fn exhausted_reconnects_raise_persistent_notice() {
        let mut client = open_client(MemoryStorage::new());
        let mut now = client.env().now();
        let mut notices = Vec::new();

        for _ in 0..5 {
            for action in client.handle(ClientEvent::TransportClosed { now, reason: "down".into() }) {
                if let ClientAction::Notice(notice) = action {
                    notices.push(notice);
                }
            }
            now += Duration::from_secs(1);
            client.handle(ClientEvent::Tick { now, transport_open: false });
        }

        assert_eq!(client.session().connection_status(), ConnectionStatus::Failed);
        assert_eq!(notices.len(), 2);
        assert!(!notices[0].is_persistent());
        assert!(notices[1].is_persistent());
    }
}

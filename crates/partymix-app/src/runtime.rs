//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`Client`]: session state machine
//! - [`Driver`]: Platform-specific I/O
//!
//! Events are handled one at a time in arrival order, so the client is never
//! touched concurrently.

use partymix_client::{Client, ClientAction, ClientEvent, Storage};
use partymix_core::Environment;

use crate::{AppEvent, Driver, DriverEvent, SocketEvent};

/// Generic runtime that orchestrates the Client and a Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
/// - `S`: Storage for identity and room persistence
pub struct Runtime<D, E, S>
where
    D: Driver,
    E: Environment,
    S: Storage,
{
    driver: D,
    client: Client<E, S>,
}

impl<D, E, S> Runtime<D, E, S>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    S: Storage,
{
    /// Create a new runtime around a driver and a client.
    pub fn new(driver: D, client: Client<E, S>) -> Self {
        Self { driver, client }
    }

    /// Run the main event loop.
    ///
    /// 1. Requests a connection, then resolves identity (which replays it)
    /// 2. Feeds every driver event to the client
    /// 3. Executes the resulting actions through the driver
    ///
    /// Returns when the driver runs out of events or the user quits.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters a fatal I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.start()?;

        while let Some(event) = self.driver.next_event().await? {
            if self.step(event)? {
                break;
            }
        }

        self.shutdown()
    }

    /// Publish the initial state and start connecting.
    pub fn start(&mut self) -> Result<(), D::Error> {
        self.driver.publish(self.client.session())?;

        let now = self.driver.now();
        let mut actions = self.client.handle(ClientEvent::Connect { now });
        actions.extend(self.client.resolve_identity());
        self.process_actions(actions)
    }

    /// Process one driver event.
    ///
    /// Returns `true` if the application should quit.
    pub fn step(&mut self, event: DriverEvent) -> Result<bool, D::Error> {
        let now = self.driver.now();
        let actions = match event {
            DriverEvent::Input(AppEvent::Quit) => return Ok(true),
            DriverEvent::Input(input) => self.handle_input(input, now)?,
            DriverEvent::Socket(SocketEvent::Opened) => {
                self.client.handle(ClientEvent::TransportOpened { now })
            },
            DriverEvent::Socket(SocketEvent::Frame(text)) => {
                self.client.handle(ClientEvent::FrameReceived(text))
            },
            DriverEvent::Socket(SocketEvent::Closed { reason }) => {
                self.client.handle(ClientEvent::TransportClosed { now, reason })
            },
            DriverEvent::Tick => {
                let transport_open = self.driver.is_open();
                self.client.handle(ClientEvent::Tick { now, transport_open })
            },
        };

        self.process_actions(actions)?;
        Ok(false)
    }

    /// Tear the connection down and stop the driver.
    pub fn shutdown(mut self) -> Result<(), D::Error> {
        let actions = self.client.handle(ClientEvent::Disconnect);
        self.process_actions(actions)?;
        self.driver.stop();
        Ok(())
    }

    fn handle_input(
        &mut self,
        input: AppEvent,
        now: E::Instant,
    ) -> Result<Vec<ClientAction>, D::Error> {
        let actions = match input {
            AppEvent::CreateRoom => self.client.create_room(),
            AppEvent::JoinRoom { code } => self.client.join_room(code),
            AppEvent::LeaveRoom => self.client.leave_room(),
            AppEvent::SubmitTrack { url } => self.client.submit_track(url),
            AppEvent::CastVote => self.client.cast_vote(),
            AppEvent::RefreshQueue => self.client.request_refresh(),
            AppEvent::Foreground => self.client.handle(ClientEvent::Foreground { now }),
            AppEvent::Reconnect => self.client.handle(ClientEvent::Connect { now }),
            AppEvent::ShowStatus => {
                self.driver.publish(self.client.session())?;
                Vec::new()
            },
            AppEvent::Quit => Vec::new(),
        };
        Ok(actions)
    }

    /// Execute client actions.
    ///
    /// Transport failures while executing feed back into the client, which
    /// may produce more actions; those are processed in the same call.
    fn process_actions(&mut self, initial_actions: Vec<ClientAction>) -> Result<(), D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    ClientAction::OpenTransport { url } => {
                        if let Err(e) = self.driver.open(&url) {
                            tracing::warn!(error = %e, %url, "failed to open transport");
                            pending_actions.extend(self.transport_failed(e.to_string()));
                        }
                    },
                    ClientAction::CloseTransport => self.driver.close(),
                    ClientAction::Send(message) => {
                        let text = match message.encode() {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::warn!(error = %e, action = message.name(), "dropping unencodable message");
                                continue;
                            },
                        };
                        if let Err(e) = self.driver.send(text) {
                            tracing::warn!(error = %e, action = message.name(), "send failed");
                            pending_actions.extend(self.transport_failed(e.to_string()));
                        }
                    },
                    ClientAction::SessionChanged => self.driver.publish(self.client.session())?,
                    ClientAction::Notice(notice) => self.driver.notify(&notice)?,
                }
            }
        }
        Ok(())
    }

    fn transport_failed(&mut self, reason: String) -> Vec<ClientAction> {
        let now = self.driver.now();
        self.client.handle(ClientEvent::TransportClosed { now, reason })
    }

    /// Get a reference to the Client
    pub fn client(&self) -> &Client<E, S> {
        &self.client
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

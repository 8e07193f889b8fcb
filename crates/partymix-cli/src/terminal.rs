//! Terminal driver for the CLI.
//!
//! Implements the [`Driver`] trait with line commands from an async reader,
//! a tokio-tungstenite WebSocket for the network, and plain-text output.
//!
//! Every transport is tagged with a generation number. Opening or closing
//! bumps the generation, so callbacks from a socket that has been replaced
//! are dropped instead of reaching the client.

use std::{
    io::{self, Stdout, Write},
    time::{Duration, Instant},
};

use partymix_app::{Driver, DriverEvent, SocketEvent};
use partymix_client::{
    Notice, SessionState,
    transport::{self, TransportError, TransportEvent, TransportHandle},
};
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc,
    time::{Interval, MissedTickBehavior},
};

use crate::{commands::parse_command, view};

/// Interval at which deadlines are checked.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error reading commands or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

type Tagged = (u64, TransportEvent);

/// Terminal driver implementing the [`Driver`] trait.
///
/// Reads commands from `R` and writes the session view to `W`.
pub struct TerminalDriver<R, W> {
    lines: Lines<R>,
    output: W,
    ticker: Interval,
    socket_tx: mpsc::UnboundedSender<Tagged>,
    socket_rx: mpsc::UnboundedReceiver<Tagged>,
    transport: Option<TransportHandle>,
    generation: u64,
}

impl TerminalDriver<BufReader<Stdin>, Stdout> {
    /// Driver over stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), io::stdout(), TICK_INTERVAL)
    }
}

impl<R, W> TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    /// Create a driver. Must be called inside a tokio runtime.
    pub fn new(input: R, output: W, tick: Duration) -> Self {
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            lines: input.lines(),
            output,
            ticker,
            socket_tx,
            socket_rx,
            transport: None,
            generation: 0,
        }
    }

    /// The output sink.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Translate a transport callback, or `None` if it is stale.
    fn accept_socket_event(&mut self, generation: u64, event: TransportEvent) -> Option<SocketEvent> {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "dropping stale transport event");
            return None;
        }
        Some(match event {
            TransportEvent::Opened => SocketEvent::Opened,
            TransportEvent::Frame(text) => SocketEvent::Frame(text),
            TransportEvent::Closed { reason } => {
                self.transport = None;
                SocketEvent::Closed { reason }
            },
        })
    }

    fn retire_transport(&mut self) {
        self.generation += 1;
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }
}

impl<R, W> Driver for TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    type Error = TerminalError;
    type Instant = Instant;

    async fn next_event(&mut self) -> Result<Option<DriverEvent>, Self::Error> {
        loop {
            tokio::select! {
                biased;

                // Transport callbacks
                Some((generation, event)) = self.socket_rx.recv() => {
                    if let Some(event) = self.accept_socket_event(generation, event) {
                        return Ok(Some(event.into()));
                    }
                }

                // Line commands
                line = self.lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(None);
                    };
                    match parse_command(&line) {
                        Ok(Some(event)) => return Ok(Some(event.into())),
                        Ok(None) => {},
                        Err(e) => writeln!(self.output, "{e}")?,
                    }
                }

                // Deadlines
                _ = self.ticker.tick() => return Ok(Some(DriverEvent::Tick)),
            }
        }
    }

    fn open(&mut self, url: &str) -> Result<(), Self::Error> {
        self.retire_transport();

        let generation = self.generation;
        let tx = self.socket_tx.clone();
        tracing::info!(%url, generation, "connecting");
        self.transport = Some(transport::spawn(url.to_owned(), move |event| {
            // The receiver only goes away when the driver does.
            let _ = tx.send((generation, event));
        }));
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), Self::Error> {
        let transport = self.transport.as_ref().ok_or(TransportError::NotOpen)?;
        transport.send(text)?;
        Ok(())
    }

    fn close(&mut self) {
        self.retire_transport();
    }

    fn is_open(&self) -> bool {
        self.transport.as_ref().is_some_and(TransportHandle::is_open)
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn publish(&mut self, session: &SessionState) -> Result<(), Self::Error> {
        writeln!(self.output, "{}", view::render_session(session))?;
        self.output.flush()?;
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) -> Result<(), Self::Error> {
        writeln!(self.output, "{}", view::render_notice(notice))?;
        self.output.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.abort();
        }
        let _ = self.output.flush();
    }
}

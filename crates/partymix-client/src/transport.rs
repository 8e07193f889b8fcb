//! WebSocket transport for the client.
//!
//! Provides [`TransportHandle`], a thin layer that moves text frames between
//! a tokio-tungstenite socket and the caller. Session logic stays in the
//! Sans-IO [`Client`](crate::Client); this module only reports what happened
//! to the socket.
//!
//! Each spawned transport reports [`TransportEvent::Opened`] at most once and
//! [`TransportEvent::Closed`] exactly once, after which it emits nothing.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket is closed or was never opened.
    #[error("transport is not open")]
    NotOpen,
}

/// Socket lifecycle reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// Text frame from the server.
    Frame(String),
    /// Socket closed, errored, or failed to connect.
    Closed {
        /// Why it closed
        reason: String,
    },
}

enum Outbound {
    Text(String),
    Close,
}

/// Handle to a spawned WebSocket.
///
/// Frames are sent through the handle and an internal task does the socket
/// I/O. Dropping the handle closes the socket gracefully.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
    abort_handle: tokio::task::AbortHandle,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Self::Close => f.write_str("Close"),
        }
    }
}

impl TransportHandle {
    /// Queue a text frame.
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.outbound.send(Outbound::Text(text)).map_err(|_| TransportError::NotOpen)
    }

    /// `true` between the handshake and the close.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Start a graceful close. The task exits once the close frame is sent.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Stop the socket task immediately.
    pub fn abort(&self) {
        self.open.store(false, Ordering::Release);
        self.abort_handle.abort();
    }
}

/// Spawn a WebSocket connection to `url` on the current tokio runtime.
///
/// `on_event` is called from the socket task for every lifecycle event.
pub fn spawn<F>(url: String, on_event: F) -> TransportHandle
where
    F: FnMut(TransportEvent) + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(run_socket(url, outbound_rx, Arc::clone(&open), on_event));

    TransportHandle { outbound: outbound_tx, open, abort_handle: task.abort_handle() }
}

async fn run_socket<F>(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
    mut on_event: F,
) where
    F: FnMut(TransportEvent) + Send + 'static,
{
    tracing::debug!(%url, "opening websocket");
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            on_event(TransportEvent::Closed { reason: format!("connect failed: {e}") });
            return;
        },
    };

    open.store(true, Ordering::Release);
    on_event(TransportEvent::Opened);

    let (mut sink, mut source) = stream.split();
    let reason = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        break format!("send failed: {e}");
                    }
                },
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break "closed by client".to_owned();
                },
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => on_event(TransportEvent::Frame(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    break frame.map_or_else(
                        || "closed by server".to_owned(),
                        |f| format!("closed by server: {} {}", f.code, f.reason.as_str()),
                    );
                },
                Some(Ok(Message::Binary(bytes))) => {
                    tracing::debug!(len = bytes.len(), "ignoring binary frame");
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => break format!("socket error: {e}"),
                None => break "stream ended".to_owned(),
            },
        }
    };

    open.store(false, Ordering::Release);
    tracing::debug!(%reason, "websocket closed");
    on_event(TransportEvent::Closed { reason });
}

//! Action-based session client for Party Mix rooms.
//!
//! The client is a Sans-IO state machine: the caller feeds it
//! [`ClientEvent`]s (transport callbacks, inbound frames, clock ticks) and
//! calls its command methods, and it returns [`ClientAction`]s for the caller
//! to execute (open or close the transport, send a message, republish state).
//! Persistence goes through the synchronous [`Storage`] trait so room changes
//! are durable before the next reconnect.
//!
//! # Components
//!
//! - [`IdentityStore`]: durable client identifier
//! - [`ConnectionManager`](partymix_core::ConnectionManager): transport
//!   lifecycle, owned by the client
//! - dispatcher: applies each [`ServerMessage`](partymix_proto::ServerMessage)
//!   to the [`SessionState`]
//! - [`Client`]: session state plus the command API
//!
//! # Features
//!
//! - `transport`: tokio-tungstenite WebSocket transport ([`transport`])

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod dispatcher;
mod error;
mod event;
mod identity;
mod notice;
mod session;
pub mod storage;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_SERVER_URL, build_server_url};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
pub use identity::{ClientIdentity, IdentityStore};
pub use notice::{Notice, NoticeKind};
pub use session::SessionState;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

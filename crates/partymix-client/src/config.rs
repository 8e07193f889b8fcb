//! Client configuration.

use std::time::Duration;

use partymix_core::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, ReconnectPolicy};
use url::Url;

use crate::ClientError;

/// Session server used when no URL is baked in at build time.
pub const DEFAULT_SERVER_URL: &str = "wss://eliottb.dev:8080";

/// Server URL fixed at build time through `PARTYMIX_SERVER_URL`.
#[must_use]
pub fn build_server_url() -> &'static str {
    option_env!("PARTYMIX_SERVER_URL").unwrap_or(DEFAULT_SERVER_URL)
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the session server.
    pub server_url: String,
    /// Reconnect bound and delays.
    pub reconnect: ReconnectPolicy,
    /// Interval between keep-alive frames while open.
    pub keepalive_interval: Duration,
    /// Time allowed for a transport to open.
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: build_server_url().to_owned(),
            reconnect: ReconnectPolicy::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Check that the server URL is a `ws://` or `wss://` URL.
    pub fn validate(&self) -> Result<(), ClientError> {
        let invalid = |reason: String| ClientError::InvalidServerUrl {
            url: self.server_url.clone(),
            reason,
        };

        let url = Url::parse(&self.server_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(invalid(format!("unsupported scheme {other:?}"))),
        }
    }
}

//! The resilient publishing link.
//!
//! State machine per agent process: `Disconnected → Connecting →
//! Connected`, back to `Disconnected` on error, around again on retry.
//! There is no terminal state short of process exit; a headless agent has
//! no operator to report failure to, so connecting blocks until it works.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use devicepulse_protocol::constants::{
    CONNECT_RETRY_INTERVAL, DEVICE_ID_PARAM, PUBLISHER_PATH,
};

use crate::config::AgentConfig;
use crate::sampler::Sampler;

type Conn = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors that end the publish loop. Everything else is retried.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Builds the publisher URL for a relay address.
///
/// Secure scheme iff the address carries a secure prefix; `http(s)://`
/// and `ws(s)://` prefixes are stripped before the target is assembled.
pub fn publisher_url(server_addr: &str, device_id: &str) -> String {
    let secure = server_addr.starts_with("https://") || server_addr.starts_with("wss://");
    let scheme = if secure { "wss" } else { "ws" };
    let trimmed = server_addr
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("wss://")
        .trim_start_matches("ws://");
    format!("{scheme}://{trimmed}{PUBLISHER_PATH}?{DEVICE_ID_PARAM}={device_id}")
}

/// Drives the publish side of one agent.
pub struct AgentLink {
    config: AgentConfig,
    sampler: Box<dyn Sampler>,
    state: LinkState,
}

impl AgentLink {
    pub fn new(config: AgentConfig, sampler: Box<dyn Sampler>) -> Self {
        Self {
            config,
            sampler,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Runs the publish loop.
    ///
    /// Connects (blocking until the relay is reachable), then samples and
    /// sends one frame per tick. A failed send closes the connection and
    /// dials again; the failed tick's frame is not resent. Returns only
    /// on the fatal path (malformed address or unserializable snapshot).
    pub async fn run(mut self) -> Result<(), LinkError> {
        let url = publisher_url(&self.config.server_addr, &self.config.device_id);
        tracing::info!(
            device_id = %self.config.device_id,
            interval_secs = self.config.interval_secs,
            "starting publish loop"
        );

        let mut conn = self.connect(&url).await?;

        let tick = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // Skip the immediate first tick.

        loop {
            ticker.tick().await;

            let snapshot = self.sampler.sample();
            let frame = snapshot.to_frame()?;

            if let Err(e) = conn.send(Message::Text(frame.into())).await {
                tracing::warn!("send failed: {e}; reconnecting");
                let _ = conn.close(None).await;
                self.state = LinkState::Disconnected;
                conn = self.connect(&url).await?;
            }
        }
    }

    /// Dials the relay, retrying indefinitely at the fixed interval.
    ///
    /// Returns an error only for an address the dialer rejects outright;
    /// every transport failure is retried.
    async fn connect(&mut self, url: &str) -> Result<Conn, LinkError> {
        self.state = LinkState::Connecting;
        tracing::info!(%url, "connecting to relay");

        loop {
            match connect_async(url).await {
                Ok((conn, _)) => {
                    self.state = LinkState::Connected;
                    tracing::info!("connected to relay");
                    return Ok(conn);
                }
                Err(e @ (tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_))) => {
                    // Nothing to retry: the address itself is unusable.
                    self.state = LinkState::Disconnected;
                    return Err(LinkError::InvalidAddress(e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(
                        "connect failed: {e}; retrying in {}s",
                        CONNECT_RETRY_INTERVAL.as_secs()
                    );
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
            }
        }
    }
}

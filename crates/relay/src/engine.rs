//! Relay engine: session loops and frame fan-out.
//!
//! One task per accepted connection runs the matching session loop to
//! completion. The publisher loop is the only place frames enter the
//! relay; delivery happens inline from that loop against a copy of the
//! observer set, so there is no broadcast queue and no retained state.

use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use uuid::Uuid;

use crate::connection::{self, write_pump};
use crate::registry::{Registry, Role};

/// Routes frames from publishers to the observers of their device id.
pub struct RelayEngine {
    registry: Registry,
}

impl RelayEngine {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs a publisher session to completion.
    ///
    /// Every received data frame is fanned out verbatim; the loop ends
    /// only when the peer goes away. Payload content is opaque here.
    pub async fn run_publisher(&self, device_id: &str, socket: WebSocket) {
        let (sink, mut stream) = socket.split();
        let (sender, rx) = connection::channel();
        tokio::spawn(write_pump(sink, rx));

        let conn_id = Uuid::new_v4();
        self.registry
            .register(device_id, Role::Publisher, conn_id, sender);
        tracing::info!(%device_id, %conn_id, "publisher connected");

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(msg @ (Message::Text(_) | Message::Binary(_))) => {
                    self.fan_out(device_id, msg);
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {} // Ping/pong: answered by the transport.
                Err(e) => {
                    tracing::debug!(%device_id, "publisher read error: {e}");
                    break;
                }
            }
        }

        self.registry
            .unregister(device_id, Role::Publisher, conn_id);
        tracing::info!(%device_id, %conn_id, "publisher disconnected");
    }

    /// Runs an observer session to completion.
    ///
    /// Observers have nothing meaningful to send; reading here exists
    /// solely to notice the peer going away, so a data frame ends the
    /// session exactly like an error does.
    pub async fn run_observer(&self, device_id: &str, socket: WebSocket) {
        let (sink, mut stream) = socket.split();
        let (sender, rx) = connection::channel();
        tokio::spawn(write_pump(sink, rx));

        let conn_id = Uuid::new_v4();
        self.registry
            .register(device_id, Role::Observer, conn_id, sender);
        tracing::info!(%device_id, %conn_id, "observer connected");

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Ok(_) => break,
                Err(e) => {
                    tracing::debug!(%device_id, "observer read error: {e}");
                    break;
                }
            }
        }

        self.registry
            .unregister(device_id, Role::Observer, conn_id);
        tracing::info!(%device_id, %conn_id, "observer disconnected");
    }

    /// Delivers one frame to every observer of `device_id`.
    ///
    /// The observer set is copied out before any send, so no lock is held
    /// during delivery; a failed send is dropped for that observer only.
    fn fan_out(&self, device_id: &str, frame: Message) {
        for observer in self.registry.observers_of(device_id) {
            if observer.send_frame(frame.clone()).is_err() {
                tracing::warn!(%device_id, "observer send failed, frame dropped for that connection");
            }
        }
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

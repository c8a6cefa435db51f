//! The DevicePulse relay.
//!
//! Device agents connect as publishers and push one telemetry frame per
//! tick; observers subscribe to a device id and receive every frame its
//! publishers send while they are attached. The relay keeps no history
//! and makes no delivery guarantee: a frame is fanned out to whoever is
//! registered at the moment it arrives, then forgotten.

mod connection;
mod engine;
mod registry;
mod server;

pub use connection::{SendError, Sender};
pub use engine::RelayEngine;
pub use registry::{ConnId, Registry, Role};
pub use server::{RelayConfig, RelayServer};

/// Errors produced by the relay server.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

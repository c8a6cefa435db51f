//! The DevicePulse agent: samples local machine metrics on a fixed tick
//! and publishes them to a relay over WebSocket.
//!
//! The link never gives up: connecting retries indefinitely at a fixed
//! interval, and a failed send tears the connection down and dials again.
//! Ticks that pass while disconnected are simply lost; telemetry is a
//! gauge stream, not an event log.

mod config;
mod link;
pub mod sampler;

pub use config::{AgentConfig, default_device_id};
pub use link::{AgentLink, LinkError, LinkState, publisher_url};

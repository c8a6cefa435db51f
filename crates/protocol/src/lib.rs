//! Wire types shared by the DevicePulse agent and relay.
//!
//! A telemetry frame is one flat JSON object per WebSocket message: metric
//! name to value, no envelope, no sequence number. Both sides depend on
//! this crate so the frame format lives in exactly one place.

pub mod constants;
pub mod snapshot;

pub use snapshot::{MetricValue, TelemetrySnapshot};

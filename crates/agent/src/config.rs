//! Agent configuration.

use devicepulse_protocol::constants::DEFAULT_TICK_INTERVAL_SECS;

/// Configuration for one agent process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Relay address, e.g. `http://relay.example:8000`.
    pub server_addr: String,
    /// Device id this agent publishes under.
    pub device_id: String,
    /// Seconds between telemetry ticks (minimum 1).
    pub interval_secs: u64,
}

impl AgentConfig {
    pub fn new(server_addr: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            device_id: device_id.into(),
            interval_secs: DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}

/// Device id used when none is configured: the machine hostname, or a
/// random id when the hostname is unavailable.
pub fn default_device_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| format!("device-{}", uuid::Uuid::new_v4()))
}

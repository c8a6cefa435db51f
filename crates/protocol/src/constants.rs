use std::time::Duration;

/// Path of the publisher WebSocket endpoint on the relay.
pub const PUBLISHER_PATH: &str = "/ws";

/// Query parameter carrying the device id on the publisher endpoint.
pub const DEVICE_ID_PARAM: &str = "device_id";

/// Fixed delay between agent connect attempts.
///
/// The agent retries indefinitely at this interval; there is no backoff
/// and no retry cap. A headless agent has nobody to report failure to.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Default seconds between telemetry ticks.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 2;

/// How often the relay sends keepalive pings on established connections.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(30);

/// Maximum telemetry frame size in bytes (256 KB).
///
/// Frames are small flat metric maps; anything near this size is a
/// misbehaving peer.
pub const WS_MAX_MESSAGE_SIZE: usize = 256 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_interval_is_five_seconds() {
        assert_eq!(CONNECT_RETRY_INTERVAL, Duration::from_secs(5));
    }

    #[test]
    fn default_tick_is_two_seconds() {
        assert_eq!(DEFAULT_TICK_INTERVAL_SECS, 2);
    }
}

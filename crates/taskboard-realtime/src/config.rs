//! Channel configuration.

use std::time::Duration;

use taskboard_core::retry::BackoffPolicy;
use taskboard_settings::TaskboardSettings;

/// Default capacity of the delivery report broadcast.
pub const DEFAULT_REPORT_CAPACITY: usize = 64;

/// Behavior of an [`EventChannel`](crate::EventChannel).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// A transport `open` slower than this counts as a failed handshake.
    pub handshake_timeout: Duration,
    /// Reconnect backoff after failed handshakes.
    pub backoff: BackoffPolicy,
    /// Buffered delivery reports per receiver before it lags.
    pub report_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
            report_capacity: DEFAULT_REPORT_CAPACITY,
        }
    }
}

impl ChannelConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &TaskboardSettings) -> Self {
        Self {
            handshake_timeout: Duration::from_millis(settings.channel.handshake_timeout_ms),
            backoff: settings.reconnect.clone(),
            report_capacity: DEFAULT_REPORT_CAPACITY,
        }
    }
}

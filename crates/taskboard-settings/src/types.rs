//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so partial
//! JSON fills in missing fields from [`Default`].

use serde::{Deserialize, Serialize};
use taskboard_core::logging::LogFormat;
use taskboard_core::retry::BackoffPolicy;
use tracing::warn;

/// Root settings type.
///
/// ```json
/// {
///   "channel": { "echoDelayMs": 50 },
///   "reconnect": { "maxAttempts": 3 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskboardSettings {
    /// Channel and simulated transport timing.
    pub channel: ChannelSettings,
    /// Reconnect backoff.
    pub reconnect: BackoffPolicy,
    /// Activity feed limits.
    pub feed: FeedSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl TaskboardSettings {
    /// Clamp out-of-range values in place, warning for each correction.
    pub fn validate(&mut self) {
        self.channel.validate();
        validate_reconnect(&mut self.reconnect);
        self.feed.validate();
    }

    /// Consume `self`, returning the validated settings.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channel
// ─────────────────────────────────────────────────────────────────────────────

/// Timing for the channel handshake and the simulated server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Simulated handshake latency in ms.
    pub handshake_latency_ms: u64,
    /// Handshake attempts slower than this count as failed.
    pub handshake_timeout_ms: u64,
    /// Round-trip delay before a sent event is echoed back, in ms.
    pub echo_delay_ms: u64,
    /// Interval of simulated presence broadcasts. `None` or `0` disables them.
    pub presence_interval_ms: Option<u64>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            handshake_latency_ms: 500,
            handshake_timeout_ms: 5000,
            echo_delay_ms: 100,
            presence_interval_ms: Some(10_000),
        }
    }
}

impl ChannelSettings {
    fn validate(&mut self) {
        if self.handshake_timeout_ms < self.handshake_latency_ms {
            warn!(
                handshake_timeout_ms = self.handshake_timeout_ms,
                handshake_latency_ms = self.handshake_latency_ms,
                "handshake timeout shorter than latency, raising"
            );
            self.handshake_timeout_ms = self.handshake_latency_ms;
        }
        if self.presence_interval_ms == Some(0) {
            self.presence_interval_ms = None;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reconnect
// ─────────────────────────────────────────────────────────────────────────────

fn validate_reconnect(policy: &mut BackoffPolicy) {
    if !(0.0..=1.0).contains(&policy.jitter_factor) {
        let clamped = if policy.jitter_factor.is_nan() {
            0.0
        } else {
            policy.jitter_factor.clamp(0.0, 1.0)
        };
        warn!(
            jitter_factor = policy.jitter_factor,
            clamped, "jitter factor out of range, clamping"
        );
        policy.jitter_factor = clamped;
    }
    if policy.max_attempts == 0 {
        warn!("reconnect maxAttempts is 0, using 1");
        policy.max_attempts = 1;
    }
    if policy.max_delay_ms < policy.base_delay_ms {
        warn!(
            max_delay_ms = policy.max_delay_ms,
            base_delay_ms = policy.base_delay_ms,
            "reconnect maxDelayMs below baseDelayMs, raising"
        );
        policy.max_delay_ms = policy.base_delay_ms;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feed + logging
// ─────────────────────────────────────────────────────────────────────────────

/// Activity feed limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedSettings {
    /// Entries retained by the activity log, newest first.
    pub activity_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            activity_capacity: 20,
        }
    }
}

impl FeedSettings {
    fn validate(&mut self) {
        if self.activity_capacity == 0 {
            warn!("feed activityCapacity is 0, using 1");
            self.activity_capacity = 1;
        }
    }
}

/// Log output configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

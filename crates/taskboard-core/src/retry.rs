//! Reconnect backoff policy and delay calculation.
//!
//! Sync-only building blocks. The async retry loop lives in the channel
//! (`taskboard-realtime`), which supplies randomness when jitter is enabled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Default cap on consecutive handshake failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Capped exponential backoff for reconnects.
///
/// `max_attempts` counts consecutive handshake failures. After failure `k`
/// (1-based) the next handshake is scheduled `base × 2^(k-1)` later, unless
/// `k` has reached the cap, in which case nothing is scheduled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffPolicy {
    /// Delay before the first retry in ms.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay in ms.
    pub max_delay_ms: u64,
    /// Consecutive failures after which retrying stops.
    pub max_attempts: u32,
    /// Symmetric jitter range, 0.0 to 1.0.
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter_factor: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Whether `failures` consecutive failures exhaust the policy.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }

    /// Delay before retry number `retry` (zero-based), without jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            retry,
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }

    /// Delay before retry number `retry` with jitter drawn from `random`
    /// (a value in `[0.0, 1.0)`).
    pub fn jittered_delay_for(&self, retry: u32, random: f64) -> Duration {
        Duration::from_millis(calculate_backoff_delay_with_random(
            retry,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
            random,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff: `min(max_delay, base_delay * 2^attempt)`.
///
/// `attempt` is zero-based (0 for the first retry).
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}

/// Exponential backoff with symmetric jitter.
///
/// Maps `random` in `[0, 1)` to a multiplier in `[1 - jitter, 1 + jitter]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay_with_random(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let capped = calculate_backoff_delay(attempt, base_delay_ms, max_delay_ms);
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    ((capped as f64) * jitter).round().max(0.0) as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

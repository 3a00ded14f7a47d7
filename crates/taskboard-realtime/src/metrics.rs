//! Metric names recorded by the channel.
//!
//! Recorded through the `metrics` facade. No exporter is installed here;
//! the embedding binary decides whether to install a recorder.

/// Events accepted by `send` (counter, labels: kind).
pub const EVENTS_SENT_TOTAL: &str = "channel_events_sent_total";
/// Sends rejected before reaching the transport (counter, labels: reason).
pub const SENDS_REJECTED_TOTAL: &str = "channel_sends_rejected_total";
/// Delivery rounds run (counter, labels: kind).
pub const DELIVERY_ROUNDS_TOTAL: &str = "channel_delivery_rounds_total";
/// Subscriber callbacks that failed or panicked (counter, labels: category).
pub const SUBSCRIBER_FAILURES_TOTAL: &str = "channel_subscriber_failures_total";
/// Failed handshakes (counter, labels: category).
pub const HANDSHAKE_FAILURES_TOTAL: &str = "channel_handshake_failures_total";
/// Registered subscribers (gauge).
pub const SUBSCRIBERS_ACTIVE: &str = "channel_subscribers_active";
/// 1 while connected, 0 otherwise (gauge).
pub const CONNECTED: &str = "channel_connected";

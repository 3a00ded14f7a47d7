//! Connection indicator shown in the dashboard header.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;
use taskboard_core::events::Timestamp;
use taskboard_realtime::{ConnectionState, EventChannel, Subscription};
use tokio::sync::watch;

/// What the indicator displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndicatorStatus {
    /// Connected.
    Live,
    /// Handshake in progress.
    Connecting,
    /// Disconnected, whether or not a retry is pending.
    Offline,
}

impl IndicatorStatus {
    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Connecting => "Connecting...",
            Self::Offline => "Offline",
        }
    }
}

impl From<ConnectionState> for IndicatorStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => Self::Live,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Disconnected => Self::Offline,
        }
    }
}

impl fmt::Display for IndicatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const NO_EVENT: Timestamp = Timestamp::MIN;

/// Follows the channel's connection state and the timestamp of the last
/// event delivered.
#[derive(Debug)]
pub struct ConnectionIndicator {
    state: watch::Receiver<ConnectionState>,
    last_event: Arc<AtomicI64>,
    subscription: Subscription,
}

impl ConnectionIndicator {
    /// Start following `channel`.
    pub fn attach(channel: &EventChannel) -> Self {
        let last_event = Arc::new(AtomicI64::new(NO_EVENT));
        let seen = Arc::clone(&last_event);
        let subscription = channel.subscribe(move |event| {
            seen.store(event.timestamp, Ordering::Relaxed);
            Ok(())
        });
        Self {
            state: channel.watch_state(),
            last_event,
            subscription,
        }
    }

    /// Current status.
    pub fn status(&self) -> IndicatorStatus {
        (*self.state.borrow()).into()
    }

    /// Timestamp of the most recently delivered event, if any.
    ///
    /// This is arrival order, not the largest timestamp: an event stamped
    /// by a sender with a slower clock still replaces it.
    pub fn last_event_at(&self) -> Option<Timestamp> {
        match self.last_event.load(Ordering::Relaxed) {
            NO_EVENT => None,
            ts => Some(ts),
        }
    }

    /// Display label for the current status.
    pub fn render(&self) -> &'static str {
        self.status().label()
    }

    /// Wait for the next status change and return the new status.
    ///
    /// Returns `None` once the channel is gone.
    pub async fn changed(&mut self) -> Option<IndicatorStatus> {
        self.state.changed().await.ok()?;
        Some(self.status())
    }

    /// Stop tracking events.
    pub fn detach(&self) -> bool {
        self.subscription.revoke()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(IndicatorStatus::from(ConnectionState::Connected).label(), "Live");
        assert_eq!(
            IndicatorStatus::from(ConnectionState::Connecting).to_string(),
            "Connecting..."
        );
        assert_eq!(IndicatorStatus::from(ConnectionState::Disconnected).label(), "Offline");
    }
}

//! Per-round delivery reports.

use taskboard_core::events::{Event, EventKind, Timestamp};

use crate::errors::SubscriberCallbackError;
use crate::registry::SubscriptionId;

/// Result of invoking one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Subscriber that was invoked.
    pub subscriber: SubscriptionId,
    /// What its callback returned.
    pub result: Result<(), SubscriberCallbackError>,
}

/// Outcome of fanning one event out to the subscriber snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Kind of the delivered event.
    pub kind: EventKind,
    /// Timestamp of the delivered event.
    pub timestamp: Timestamp,
    /// Origin of the delivered event.
    pub origin_id: String,
    /// One entry per invoked subscriber, in registration order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    pub(crate) fn for_event(event: &Event, outcomes: Vec<DeliveryOutcome>) -> Self {
        Self {
            kind: event.kind(),
            timestamp: event.timestamp,
            origin_id: event.origin_id.clone(),
            outcomes,
        }
    }

    /// Subscribers invoked in this round.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Subscribers whose callback succeeded.
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Failed subscribers and their errors.
    pub fn failures(&self) -> impl Iterator<Item = (SubscriptionId, &SubscriberCallbackError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.subscriber, e)))
    }

    /// Whether every invoked subscriber succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

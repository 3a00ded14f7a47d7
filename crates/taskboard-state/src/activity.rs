//! Bounded activity feed.
//!
//! Every event on the channel becomes one [`ActivityEntry`], newest first.
//! Once the log holds `capacity` entries the oldest is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use taskboard_core::events::{Event, EventBody, EventKind, Timestamp};
use taskboard_realtime::{EventChannel, Subscription};

use crate::merge::{Merge, MergeOutcome, subscribe_state};

/// One line in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// Entry ID (UUID v7).
    pub id: String,
    /// Kind of the event that produced the entry.
    pub kind: EventKind,
    /// Human-readable description.
    pub message: String,
    /// Event timestamp.
    pub timestamp: Timestamp,
    /// Identity that produced the event.
    pub origin_id: String,
}

/// Human-readable description of an event.
pub fn describe(event: &Event) -> String {
    match &event.body {
        EventBody::ProjectUpdated(update) => {
            let name = update.updates.name.as_deref().unwrap_or(&update.id);
            format!("Updated project: {name}")
        }
        EventBody::TaskCreated(task) => format!("Created task: {}", task.title),
        EventBody::TaskUpdated(update) => {
            let title = update.updates.title.as_deref().unwrap_or(&update.task_id);
            format!("Updated task: {title}")
        }
        EventBody::TaskDeleted(_) => "Deleted a task".to_string(),
        EventBody::PresenceActivity(p) => format!("{} {} {}", p.action, p.resource, p.resource_id),
    }
}

#[derive(Debug)]
struct Feed {
    capacity: usize,
    entries: VecDeque<ActivityEntry>,
}

impl Merge for Feed {
    fn merge(&mut self, event: &Event) -> MergeOutcome {
        self.entries.push_front(ActivityEntry {
            id: uuid::Uuid::now_v7().to_string(),
            kind: event.kind(),
            message: describe(event),
            timestamp: event.timestamp,
            origin_id: event.origin_id.clone(),
        });
        self.entries.truncate(self.capacity);
        MergeOutcome::Applied
    }
}

/// Newest-first log of recent events.
#[derive(Debug)]
pub struct ActivityLog {
    feed: Arc<RwLock<Feed>>,
    subscription: Subscription,
}

impl ActivityLog {
    /// Subscribe an empty log holding at most `capacity` entries.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn attach(channel: &EventChannel, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let feed = Arc::new(RwLock::new(Feed {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }));
        let subscription = subscribe_state(channel, &feed);
        Self { feed, subscription }
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.feed.read().entries.iter().cloned().collect()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<ActivityEntry> {
        self.feed.read().entries.front().cloned()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.feed.read().entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.feed.read().entries.is_empty()
    }

    /// Maximum number of entries held.
    pub fn capacity(&self) -> usize {
        self.feed.read().capacity
    }

    /// Stop receiving events.
    pub fn detach(&self) -> bool {
        self.subscription.revoke()
    }
}

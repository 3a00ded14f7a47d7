//! Per-entity last-write-wins collections.
//!
//! A [`Collection`] keeps entities in insertion order together with the
//! timestamp of the last update applied to each. Updates older than that
//! timestamp are discarded; equal timestamps are applied again, which makes
//! redelivery of the same event a no-op in effect.
//!
//! Consumers implement [`Merge`] over their state and hand it to
//! [`subscribe_state`], which wires the state behind a lock into the channel.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use taskboard_core::events::{Event, Timestamp};
use taskboard_core::model::{Project, Task};
use taskboard_realtime::{EventChannel, Subscription};

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// What merging one event did to a consumer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// State changed (or was re-applied with the same timestamp).
    Applied,
    /// An update older than the entity's last applied timestamp.
    Superseded,
    /// A create for an ID that already exists.
    Duplicate,
    /// An update or delete for an unknown ID.
    Missing,
    /// The event is not for this consumer.
    Ignored,
}

impl MergeOutcome {
    /// Label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Superseded => "superseded",
            Self::Duplicate => "duplicate",
            Self::Missing => "missing",
            Self::Ignored => "ignored",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collection
// ─────────────────────────────────────────────────────────────────────────────

/// Anything stored in a [`Collection`].
pub trait Entity {
    /// Stable identifier.
    fn id(&self) -> &str;
}

impl Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An entity plus the timestamp of the last update applied to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracked<T> {
    /// Current value.
    pub value: T,
    /// Timestamp of the create or update that produced `value`.
    pub last_applied: Timestamp,
}

/// Insertion-ordered entities with per-entity LWW.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<Tracked<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> Collection<T> {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection seeded with `values`, all marked as applied at time 0.
    ///
    /// Later duplicates of an ID are dropped.
    pub fn seeded(values: impl IntoIterator<Item = T>) -> Self {
        let mut collection = Self::new();
        for value in values {
            let _ = collection.insert_new(value, 0);
        }
        collection
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|t| t.value.id() == id)
    }

    /// Append `value` unless its ID is already present.
    pub fn insert_new(&mut self, value: T, at: Timestamp) -> MergeOutcome {
        if self.position(value.id()).is_some() {
            return MergeOutcome::Duplicate;
        }
        self.items.push(Tracked {
            value,
            last_applied: at,
        });
        MergeOutcome::Applied
    }

    /// Run `apply` on the entity if `at` is not older than its last update.
    pub fn update_with(&mut self, id: &str, at: Timestamp, apply: impl FnOnce(&mut T)) -> MergeOutcome {
        let Some(index) = self.position(id) else {
            return MergeOutcome::Missing;
        };
        let tracked = &mut self.items[index];
        if at < tracked.last_applied {
            return MergeOutcome::Superseded;
        }
        apply(&mut tracked.value);
        tracked.last_applied = at;
        MergeOutcome::Applied
    }

    /// Remove by ID regardless of timestamps.
    pub fn remove(&mut self, id: &str) -> MergeOutcome {
        match self.position(id) {
            Some(index) => {
                let _ = self.items.remove(index);
                MergeOutcome::Applied
            }
            None => MergeOutcome::Missing,
        }
    }

    /// Whether an entity with this ID is present.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Current value of an entity.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|t| t.value.id() == id).map(|t| &t.value)
    }

    /// Last applied timestamp of an entity.
    pub fn last_applied(&self, id: &str) -> Option<Timestamp> {
        self.items.iter().find(|t| t.value.id() == id).map(|t| t.last_applied)
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|t| &t.value)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Entity + Clone> Collection<T> {
    /// Cloned values in insertion order.
    pub fn to_vec(&self) -> Vec<T> {
        self.values().cloned().collect()
    }

    /// Copy of the entities matching `keep`, each with its last applied
    /// timestamp.
    pub fn filtered(&self, keep: impl Fn(&T) -> bool) -> Self {
        Self {
            items: self.items.iter().filter(|t| keep(&t.value)).cloned().collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription wiring
// ─────────────────────────────────────────────────────────────────────────────

/// Consumer state that folds channel events.
pub trait Merge {
    /// Fold one event into the state.
    fn merge(&mut self, event: &Event) -> MergeOutcome;
}

/// Subscribe `state` to every event on `channel`.
///
/// The write lock is held only for the merge itself.
pub fn subscribe_state<S>(channel: &EventChannel, state: &Arc<RwLock<S>>) -> Subscription
where
    S: Merge + Send + Sync + 'static,
{
    let state = Arc::clone(state);
    channel.subscribe(move |event| {
        let outcome = state.write().merge(event);
        tracing::trace!(
            kind = %event.kind(),
            timestamp = event.timestamp,
            outcome = outcome.as_str(),
            "merged event"
        );
        Ok(())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

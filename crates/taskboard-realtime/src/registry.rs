//! Subscriber registry and revocable subscription handles.
//!
//! Delivery rounds take a [`Registry::snapshot`] when they start, so a
//! callback may subscribe or revoke during delivery without deadlocking or
//! affecting the round in progress. Revocation is also checked per entry, so
//! a callback revoked mid-round receives nothing further.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use metrics::gauge;
use parking_lot::Mutex;
use taskboard_core::events::Event;

use crate::errors::SubscriberCallbackError;
use crate::metrics::SUBSCRIBERS_ACTIVE;

/// Subscriber callback. Runs on the channel's delivery task.
pub type Callback = Arc<dyn Fn(&Event) -> Result<(), SubscriberCallbackError> + Send + Sync>;

/// Identifier of a registered subscriber, unique per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub(crate) struct Entry {
    pub(crate) id: SubscriptionId,
    pub(crate) callback: Callback,
    revoked: AtomicBool,
}

impl Entry {
    pub(crate) fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that flipped the flag.
    fn revoke(&self) -> bool {
        !self.revoked.swap(true, Ordering::AcqRel)
    }
}

/// Ordered set of live subscribers.
pub(crate) struct Registry {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<SubscriptionId, Arc<Entry>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn insert(self: &Arc<Self>, callback: Callback) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Entry {
            id,
            callback,
            revoked: AtomicBool::new(false),
        });
        let count = {
            let mut entries = self.entries.lock();
            let _ = entries.insert(id, Arc::clone(&entry));
            entries.len()
        };
        gauge!(SUBSCRIBERS_ACTIVE).set(count as f64);
        tracing::debug!(subscriber = %id, count, "subscriber registered");
        Subscription {
            id,
            entry,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: SubscriptionId) {
        let count = {
            let mut entries = self.entries.lock();
            let _ = entries.remove(&id);
            entries.len()
        };
        gauge!(SUBSCRIBERS_ACTIVE).set(count as f64);
        tracing::debug!(subscriber = %id, count, "subscriber revoked");
    }

    /// Live entries in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.entries.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Revoke every subscriber. Handles held by callers become inert.
    pub(crate) fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.entries.lock());
        for entry in drained.values() {
            let _ = entry.revoke();
        }
        gauge!(SUBSCRIBERS_ACTIVE).set(0.0);
        drained.len()
    }
}

/// Handle binding a callback to the channel's delivery list.
///
/// Revoked by [`Subscription::revoke`] or on drop, whichever comes first.
#[must_use = "dropping a Subscription revokes it"]
pub struct Subscription {
    id: SubscriptionId,
    entry: Arc<Entry>,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Identifier used in delivery reports.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop delivery to this callback.
    ///
    /// Returns `true` if this call revoked it, `false` if it was already
    /// revoked (including by channel shutdown).
    pub fn revoke(&self) -> bool {
        if !self.entry.revoke() {
            return false;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        true
    }

    /// Whether the callback still receives events.
    pub fn is_active(&self) -> bool {
        !self.entry.is_revoked()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback {
        Arc::new(|_| Ok(()))
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let registry = Arc::new(Registry::new());
        let a = registry.insert(noop());
        let b = registry.insert(noop());
        assert!(a.id() < b.id());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, a.id());
        assert_eq!(snapshot[1].id, b.id());
    }

    #[test]
    fn revoke_is_once_only() {
        let registry = Arc::new(Registry::new());
        let sub = registry.insert(noop());
        assert!(sub.revoke());
        assert!(!sub.revoke());
        assert!(!sub.is_active());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn drop_revokes() {
        let registry = Arc::new(Registry::new());
        {
            let _sub = registry.insert(noop());
            assert_eq!(registry.len(), 1);
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn snapshot_entry_sees_later_revocation() {
        let registry = Arc::new(Registry::new());
        let sub = registry.insert(noop());
        let snapshot = registry.snapshot();
        assert!(!snapshot[0].is_revoked());
        let _ = sub.revoke();
        assert!(snapshot[0].is_revoked());
    }

    #[test]
    fn clear_revokes_outstanding_handles() {
        let registry = Arc::new(Registry::new());
        let a = registry.insert(noop());
        let b = registry.insert(noop());
        assert_eq!(registry.clear(), 2);
        assert!(!a.is_active());
        assert!(!b.revoke());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn handle_outliving_registry_is_safe() {
        let registry = Arc::new(Registry::new());
        let sub = registry.insert(noop());
        drop(registry);
        assert!(sub.revoke());
    }
}

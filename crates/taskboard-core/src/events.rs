//! Event schema carried by the real-time channel.
//!
//! An [`Event`] is the body produced by a sender ([`EventBody`]) plus the
//! stamp the channel adds at send time: `timestamp` and `originId`. The JSON
//! form puts `kind` and `payload` at the top level next to the stamp:
//!
//! ```json
//! {"kind":"TaskDeleted","payload":{"projectId":"p1","taskId":"t1"},
//!  "timestamp":1700000000000,"originId":"3"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{ProjectPatch, Task, TaskPatch};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

// ─────────────────────────────────────────────────────────────────────────────
// Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminant of an [`EventBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// Field updates to a project.
    ProjectUpdated,
    /// A new task.
    TaskCreated,
    /// Field updates to a task.
    TaskUpdated,
    /// A task was removed.
    TaskDeleted,
    /// Another user is looking at something.
    PresenceActivity,
}

impl EventKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 5] = [
        Self::ProjectUpdated,
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::PresenceActivity,
    ];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProjectUpdated => "ProjectUpdated",
            Self::TaskCreated => "TaskCreated",
            Self::TaskUpdated => "TaskUpdated",
            Self::TaskDeleted => "TaskDeleted",
            Self::PresenceActivity => "PresenceActivity",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of [`EventBody::ProjectUpdated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    /// Project ID.
    pub id: String,
    /// Fields to change.
    #[serde(default)]
    pub updates: ProjectPatch,
}

/// Payload of [`EventBody::TaskUpdated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    /// Owning project ID.
    pub project_id: String,
    /// Task ID.
    pub task_id: String,
    /// Fields to change.
    #[serde(default)]
    pub updates: TaskPatch,
}

/// Payload of [`EventBody::TaskDeleted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    /// Owning project ID.
    pub project_id: String,
    /// Task ID.
    pub task_id: String,
}

/// Payload of [`EventBody::PresenceActivity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    /// What the user is doing (`"viewing"`).
    pub action: String,
    /// Resource type (`"project"`).
    pub resource: String,
    /// Resource number.
    pub resource_id: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Body + Event
// ─────────────────────────────────────────────────────────────────────────────

/// What a sender hands to the channel: kind plus payload, no stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum EventBody {
    /// See [`ProjectUpdate`].
    ProjectUpdated(ProjectUpdate),
    /// The created task in full.
    TaskCreated(Task),
    /// See [`TaskUpdate`].
    TaskUpdated(TaskUpdate),
    /// See [`TaskRef`].
    TaskDeleted(TaskRef),
    /// See [`Presence`].
    PresenceActivity(Presence),
}

impl EventBody {
    /// Discriminant of this body.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProjectUpdated(_) => EventKind::ProjectUpdated,
            Self::TaskCreated(_) => EventKind::TaskCreated,
            Self::TaskUpdated(_) => EventKind::TaskUpdated,
            Self::TaskDeleted(_) => EventKind::TaskDeleted,
            Self::PresenceActivity(_) => EventKind::PresenceActivity,
        }
    }

    /// Project the event belongs to, when it targets one.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::ProjectUpdated(p) => Some(&p.id),
            Self::TaskCreated(t) => Some(&t.project_id),
            Self::TaskUpdated(u) => Some(&u.project_id),
            Self::TaskDeleted(r) => Some(&r.project_id),
            Self::PresenceActivity(_) => None,
        }
    }

    /// Attach the channel stamp.
    pub fn stamp(self, timestamp: Timestamp, origin_id: impl Into<String>) -> Event {
        Event {
            body: self,
            timestamp,
            origin_id: origin_id.into(),
        }
    }
}

/// A stamped event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Kind and payload.
    #[serde(flatten)]
    pub body: EventBody,
    /// Send time in epoch milliseconds.
    pub timestamp: Timestamp,
    /// Identity ID of the producing actor.
    pub origin_id: String,
}

impl Event {
    /// Discriminant of the body.
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

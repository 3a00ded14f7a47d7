//! Task list consumer.
//!
//! A [`TaskList`] covers either every project or a single one. Events for
//! projects outside its scope are ignored before any merge rule runs.
//!
//! Local edits are optimistic: the list changes first, then the event is
//! sent. The echo of that event merges as a no-op (same timestamp or later,
//! same values; or a create for an ID already present).

use std::sync::Arc;

use parking_lot::RwLock;
use taskboard_core::events::{Event, EventBody, TaskRef, TaskUpdate, Timestamp, now_ms};
use taskboard_core::model::{Task, TaskPatch, format_timestamp};
use taskboard_realtime::{EventChannel, Subscription};

use crate::errors::EditError;
use crate::merge::{Collection, Merge, MergeOutcome, subscribe_state};

/// Which tasks a [`TaskList`] follows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskScope {
    /// Tasks of every project.
    #[default]
    All,
    /// Tasks of one project.
    Project(String),
}

impl TaskScope {
    /// Whether tasks of `project_id` belong in this scope.
    pub fn covers(&self, project_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Project(id) => id == project_id,
        }
    }
}

/// Tasks merged from create/update/delete events.
#[derive(Debug, Default)]
pub struct TaskState {
    /// Followed projects.
    pub scope: TaskScope,
    /// Tasks in creation order.
    pub tasks: Collection<Task>,
}

impl TaskState {
    fn apply_create(&mut self, task: &Task, at: Timestamp) -> MergeOutcome {
        if self.tasks.contains(&task.id) {
            return MergeOutcome::Duplicate;
        }
        let mut task = task.clone();
        if task.created_at.is_empty() {
            task.created_at = format_timestamp(at);
        }
        if task.updated_at.is_empty() {
            task.updated_at.clone_from(&task.created_at);
        }
        self.tasks.insert_new(task, at)
    }
}

impl Merge for TaskState {
    fn merge(&mut self, event: &Event) -> MergeOutcome {
        if !event.body.project_id().is_some_and(|p| self.scope.covers(p)) {
            return MergeOutcome::Ignored;
        }
        let at = event.timestamp;
        match &event.body {
            EventBody::TaskCreated(task) => self.apply_create(task, at),
            EventBody::TaskUpdated(update) => self
                .tasks
                .update_with(&update.task_id, at, |t| update.updates.apply_to(t, at)),
            EventBody::TaskDeleted(target) => self.tasks.remove(&target.task_id),
            EventBody::ProjectUpdated(_) | EventBody::PresenceActivity(_) => MergeOutcome::Ignored,
        }
    }
}

/// Result of [`TaskList::bulk_update`].
#[derive(Debug, Default)]
pub struct BulkUpdate {
    /// Events sent, one per updated task, in input order.
    pub sent: Vec<Event>,
    /// Tasks that could not be updated or whose event was not sent.
    pub failed: Vec<(String, EditError)>,
}

impl BulkUpdate {
    /// Whether every task was updated and sent.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Live task list bound to a channel.
#[derive(Debug)]
pub struct TaskList {
    channel: EventChannel,
    state: Arc<RwLock<TaskState>>,
    subscription: Subscription,
}

impl TaskList {
    /// Seed the list with the in-scope tasks of `seed` and subscribe it.
    pub fn attach(channel: &EventChannel, scope: TaskScope, seed: impl IntoIterator<Item = Task>) -> Self {
        let tasks = Collection::seeded(seed.into_iter().filter(|t| scope.covers(&t.project_id)));
        Self::with_state(channel, TaskState { scope, tasks })
    }

    /// A list narrowed to `scope`, starting from this list's tasks.
    ///
    /// Each task keeps the timestamp of the last update applied to it here,
    /// so a stale update discarded by this list is discarded by the new one
    /// too.
    pub fn scoped(&self, scope: TaskScope) -> Self {
        let state = self.state.read();
        let tasks = state.tasks.filtered(|t| scope.covers(&t.project_id));
        Self::with_state(&self.channel, TaskState { scope, tasks })
    }

    fn with_state(channel: &EventChannel, state: TaskState) -> Self {
        let state = Arc::new(RwLock::new(state));
        let subscription = subscribe_state(channel, &state);
        Self {
            channel: channel.clone(),
            state,
            subscription,
        }
    }

    /// Fresh task ID.
    pub fn next_task_id() -> String {
        format!("task-{}", uuid::Uuid::now_v7())
    }

    /// Followed projects.
    pub fn scope(&self) -> TaskScope {
        self.state.read().scope.clone()
    }

    /// Current tasks in order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.state.read().tasks.to_vec()
    }

    /// One task by ID.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.state.read().tasks.get(id).cloned()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.state.read().tasks.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().tasks.is_empty()
    }

    /// Whether the list still receives events.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop receiving events. The current list stays readable.
    pub fn detach(&self) -> bool {
        self.subscription.revoke()
    }

    /// Add `task` locally, then broadcast it.
    pub fn create_task(&self, task: Task) -> Result<Event, EditError> {
        {
            let mut state = self.state.write();
            if !state.scope.covers(&task.project_id) {
                return Err(EditError::OutOfScope(task.project_id));
            }
            if state.apply_create(&task, now_ms()) == MergeOutcome::Duplicate {
                return Err(EditError::DuplicateTask(task.id));
            }
        }
        Ok(self.channel.send(EventBody::TaskCreated(task))?)
    }

    /// Apply `updates` to one task locally, then broadcast them.
    pub fn update_task(&self, id: &str, updates: TaskPatch) -> Result<Event, EditError> {
        let project_id = self.apply_local(id, &updates, now_ms())?;
        Ok(self.channel.send(EventBody::TaskUpdated(TaskUpdate {
            project_id,
            task_id: id.to_string(),
            updates,
        }))?)
    }

    /// Remove one task locally, then broadcast the deletion.
    pub fn delete_task(&self, id: &str) -> Result<Event, EditError> {
        let project_id = {
            let mut state = self.state.write();
            let project_id = state
                .tasks
                .get(id)
                .map(|t| t.project_id.clone())
                .ok_or_else(|| EditError::UnknownTask(id.to_string()))?;
            let _ = state.tasks.remove(id);
            project_id
        };
        Ok(self.channel.send(EventBody::TaskDeleted(TaskRef {
            project_id,
            task_id: id.to_string(),
        }))?)
    }

    /// Apply the same `updates` to every task in `ids`, then send one
    /// update event per task.
    ///
    /// All local edits happen before the first send. Unknown IDs and send
    /// failures are collected per task; they do not stop the rest.
    pub fn bulk_update(&self, ids: &[String], updates: &TaskPatch) -> BulkUpdate {
        let at = now_ms();
        let mut result = BulkUpdate::default();
        let mut applied = Vec::with_capacity(ids.len());
        for id in ids {
            match self.apply_local(id, updates, at) {
                Ok(project_id) => applied.push((id.clone(), project_id)),
                Err(err) => result.failed.push((id.clone(), err)),
            }
        }
        for (task_id, project_id) in applied {
            let body = EventBody::TaskUpdated(TaskUpdate {
                project_id,
                task_id: task_id.clone(),
                updates: updates.clone(),
            });
            match self.channel.send(body) {
                Ok(event) => result.sent.push(event),
                Err(err) => result.failed.push((task_id, err.into())),
            }
        }
        tracing::debug!(
            sent = result.sent.len(),
            failed = result.failed.len(),
            "bulk update finished"
        );
        result
    }

    fn apply_local(&self, id: &str, updates: &TaskPatch, at: Timestamp) -> Result<String, EditError> {
        let mut state = self.state.write();
        let mut project_id = None;
        let outcome = state.tasks.update_with(id, at, |t| {
            updates.apply_to(t, at);
            project_id = Some(t.project_id.clone());
        });
        match (outcome, project_id) {
            (MergeOutcome::Applied, Some(project_id)) => Ok(project_id),
            // A remote update stamped after our clock; keep it and still send.
            (MergeOutcome::Superseded, _) => state
                .tasks
                .get(id)
                .map(|t| t.project_id.clone())
                .ok_or_else(|| EditError::UnknownTask(id.to_string())),
            _ => Err(EditError::UnknownTask(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_core::model::TaskStatus;

    fn state(scope: TaskScope) -> TaskState {
        TaskState {
            scope,
            tasks: Collection::seeded([Task::new("t1", "p1", "Design"), Task::new("t2", "p2", "Build")]),
        }
    }

    fn deleted(project: &str, task: &str, at: i64) -> Event {
        EventBody::TaskDeleted(TaskRef {
            project_id: project.into(),
            task_id: task.into(),
        })
        .stamp(at, "3")
    }

    #[test]
    fn scope_filters_foreign_projects() {
        let mut s = state(TaskScope::Project("p1".into()));
        assert_eq!(s.merge(&deleted("p2", "t2", 1)), MergeOutcome::Ignored);
        assert!(s.tasks.contains("t2"));
        assert_eq!(s.merge(&deleted("p1", "t1", 1)), MergeOutcome::Applied);
        assert!(!s.tasks.contains("t1"));
    }

    #[test]
    fn create_fills_missing_timestamps() {
        let mut s = state(TaskScope::All);
        let event = EventBody::TaskCreated(Task::new("t3", "p1", "Ship")).stamp(1_700_000_000_000, "3");
        assert_eq!(s.merge(&event), MergeOutcome::Applied);
        let t3 = s.tasks.get("t3").unwrap();
        assert_eq!(t3.created_at, "2023-11-14T22:13:20.000Z");
        assert_eq!(t3.updated_at, t3.created_at);
        assert_eq!(s.merge(&event), MergeOutcome::Duplicate);
        assert_eq!(s.tasks.len(), 3);
    }

    #[test]
    fn update_merges_fields() {
        let mut s = state(TaskScope::All);
        let event = EventBody::TaskUpdated(TaskUpdate {
            project_id: "p2".into(),
            task_id: "t2".into(),
            updates: TaskPatch::status(TaskStatus::Review),
        })
        .stamp(10, "4");
        assert_eq!(s.merge(&event), MergeOutcome::Applied);
        let t2 = s.tasks.get("t2").unwrap();
        assert_eq!(t2.status, TaskStatus::Review);
        assert_eq!(t2.title, "Build");
    }

    #[test]
    fn project_and_presence_events_are_ignored() {
        let mut s = state(TaskScope::All);
        let event = EventBody::ProjectUpdated(taskboard_core::events::ProjectUpdate {
            id: "p1".into(),
            updates: taskboard_core::model::ProjectPatch::default(),
        })
        .stamp(1, "1");
        assert_eq!(s.merge(&event), MergeOutcome::Ignored);
    }

    #[test]
    fn scope_covers() {
        assert!(TaskScope::All.covers("anything"));
        assert!(TaskScope::Project("p1".into()).covers("p1"));
        assert!(!TaskScope::Project("p1".into()).covers("p2"));
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskList::next_task_id(), TaskList::next_task_id());
        assert!(TaskList::next_task_id().starts_with("task-"));
    }
}

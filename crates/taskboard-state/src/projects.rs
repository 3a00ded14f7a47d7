//! Project list consumer.

use std::sync::Arc;

use parking_lot::RwLock;
use taskboard_core::events::{Event, EventBody, ProjectUpdate, now_ms};
use taskboard_core::model::{Project, ProjectPatch};
use taskboard_realtime::{EventChannel, Subscription};

use crate::errors::EditError;
use crate::merge::{Collection, Merge, MergeOutcome, subscribe_state};

/// Projects merged from `ProjectUpdated` events.
#[derive(Debug, Default)]
pub struct ProjectState {
    /// Projects in seed order.
    pub projects: Collection<Project>,
}

impl Merge for ProjectState {
    fn merge(&mut self, event: &Event) -> MergeOutcome {
        match &event.body {
            EventBody::ProjectUpdated(update) => {
                let at = event.timestamp;
                self.projects
                    .update_with(&update.id, at, |p| update.updates.apply_to(p, at))
            }
            _ => MergeOutcome::Ignored,
        }
    }
}

/// Live project list bound to a channel.
#[derive(Debug)]
pub struct ProjectList {
    channel: EventChannel,
    state: Arc<RwLock<ProjectState>>,
    subscription: Subscription,
}

impl ProjectList {
    /// Seed the list and subscribe it to `channel`.
    pub fn attach(channel: &EventChannel, seed: impl IntoIterator<Item = Project>) -> Self {
        let state = Arc::new(RwLock::new(ProjectState {
            projects: Collection::seeded(seed),
        }));
        let subscription = subscribe_state(channel, &state);
        Self {
            channel: channel.clone(),
            state,
            subscription,
        }
    }

    /// Current projects in order.
    pub fn snapshot(&self) -> Vec<Project> {
        self.state.read().projects.to_vec()
    }

    /// One project by ID.
    pub fn get(&self, id: &str) -> Option<Project> {
        self.state.read().projects.get(id).cloned()
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.state.read().projects.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().projects.is_empty()
    }

    /// Whether the list still receives events.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Apply `updates` locally, then broadcast them.
    ///
    /// On a send failure the local edit stays in place.
    pub fn update_project(&self, id: &str, updates: ProjectPatch) -> Result<Event, EditError> {
        let at = now_ms();
        let outcome = self
            .state
            .write()
            .projects
            .update_with(id, at, |p| updates.apply_to(p, at));
        if outcome == MergeOutcome::Missing {
            return Err(EditError::UnknownProject(id.to_string()));
        }
        let event = self.channel.send(EventBody::ProjectUpdated(ProjectUpdate {
            id: id.to_string(),
            updates,
        }))?;
        Ok(event)
    }

    /// Stop receiving events. The current list stays readable.
    pub fn detach(&self) -> bool {
        self.subscription.revoke()
    }
}

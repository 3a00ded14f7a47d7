//! Composition root for the dashboard.
//!
//! [`Dashboard::init`] takes an already constructed channel, attaches every
//! consumer to it, and [`Dashboard::teardown`] shuts the channel down. There
//! is no process-wide channel; each dashboard (or test) brings its own.

use serde::{Deserialize, Serialize};
use taskboard_core::auth::Credential;
use taskboard_core::events::Timestamp;
use taskboard_core::model::{Project, Task};
use taskboard_realtime::{ChannelError, ConnectOutcome, ConnectionState, EventChannel};
use tracing::info;

use crate::activity::{ActivityEntry, ActivityLog};
use crate::indicator::{ConnectionIndicator, IndicatorStatus};
use crate::projects::ProjectList;
use crate::tasks::{TaskList, TaskScope};

/// Initial records loaded before the channel connects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    /// Projects in display order.
    pub projects: Vec<Project>,
    /// Tasks across all projects.
    pub tasks: Vec<Task>,
}

/// Serializable view of everything the dashboard shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Channel state.
    pub connection: ConnectionState,
    /// Indicator label.
    pub indicator: IndicatorStatus,
    /// Timestamp of the last event delivered.
    pub last_event_at: Option<Timestamp>,
    /// Consecutive failed handshakes.
    pub reconnect_attempts: u32,
    /// Project list.
    pub projects: Vec<Project>,
    /// Task list.
    pub tasks: Vec<Task>,
    /// Activity feed, newest first.
    pub activity: Vec<ActivityEntry>,
}

/// Channel plus its four consumers.
#[derive(Debug)]
pub struct Dashboard {
    channel: EventChannel,
    /// Projects.
    pub projects: ProjectList,
    /// Tasks of every project.
    pub tasks: TaskList,
    /// Recent activity.
    pub activity: ActivityLog,
    /// Header indicator.
    pub indicator: ConnectionIndicator,
}

impl Dashboard {
    /// Attach all consumers to `channel`.
    ///
    /// Consumers subscribe before any connect so no event is missed.
    pub fn init(channel: EventChannel, seed: Seed, activity_capacity: usize) -> Self {
        let projects = ProjectList::attach(&channel, seed.projects);
        let tasks = TaskList::attach(&channel, TaskScope::All, seed.tasks);
        let activity = ActivityLog::attach(&channel, activity_capacity);
        let indicator = ConnectionIndicator::attach(&channel);
        info!(
            projects = projects.len(),
            tasks = tasks.len(),
            subscribers = channel.subscriber_count(),
            "dashboard initialized"
        );
        Self {
            channel,
            projects,
            tasks,
            activity,
            indicator,
        }
    }

    /// The shared channel.
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Connect the channel with `credential`.
    pub fn connect(&self, credential: Credential) -> Result<ConnectOutcome, ChannelError> {
        self.channel.connect(credential)
    }

    /// A task list for one project, sharing this dashboard's channel.
    pub fn project_tasks(&self, project_id: &str) -> TaskList {
        self.tasks.scoped(TaskScope::Project(project_id.to_string()))
    }

    /// Current view of every consumer.
    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary {
            connection: self.channel.state(),
            indicator: self.indicator.status(),
            last_event_at: self.indicator.last_event_at(),
            reconnect_attempts: self.channel.reconnect_attempts(),
            projects: self.projects.snapshot(),
            tasks: self.tasks.snapshot(),
            activity: self.activity.entries(),
        }
    }

    /// Shut the channel down. Consumers keep their last state.
    pub fn teardown(self) -> DashboardSummary {
        self.channel.shutdown();
        let summary = self.summary();
        info!(
            projects = summary.projects.len(),
            tasks = summary.tasks.len(),
            activity = summary.activity.len(),
            "dashboard torn down"
        );
        summary
    }
}

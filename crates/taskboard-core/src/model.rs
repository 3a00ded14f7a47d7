//! Project and task records shared by the dashboard consumers.
//!
//! All serializable types use `camelCase` for wire compatibility with the
//! browser dashboard. Status enums keep the dashboard's display strings
//! (`"In Progress"`, `"On Hold"`) as their wire values.
//!
//! Patches ([`ProjectPatch`], [`TaskPatch`]) carry field-level updates: a
//! `None` field is left untouched when the patch is applied.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::events::Timestamp;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Scoped but not started.
    #[default]
    Planning,
    /// Actively being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Paused.
    #[serde(rename = "On Hold")]
    OnHold,
    /// Finished.
    Completed,
    /// Abandoned.
    Cancelled,
}

/// Task status in the board workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Currently being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Awaiting review.
    Review,
    /// Done.
    Done,
}

/// Task priority level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    /// Low priority.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Elevated priority.
    High,
    /// Urgent.
    Critical,
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A project row on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    /// Project ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: ProjectStatus,
    /// Start date (ISO 8601 date).
    pub start_date: String,
    /// Planned end date (ISO 8601 date).
    pub end_date: String,
    /// Completion percentage (0 to 100).
    pub progress: u8,
    /// Budget in the dashboard's currency.
    pub budget: f64,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Managing user ID.
    pub manager_id: String,
    /// Member user IDs.
    pub team_members: Vec<String>,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last modification time (RFC 3339).
    pub updated_at: String,
}

/// A task belonging to a project.
///
/// Only `id` and `title` are required on the wire; everything else falls
/// back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task ID.
    pub id: String,
    /// Owning project ID.
    #[serde(default)]
    pub project_id: String,
    /// Task title.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Priority.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Assignee user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Due date (ISO 8601 date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Creation time (RFC 3339).
    #[serde(default)]
    pub created_at: String,
    /// Last modification time (RFC 3339).
    #[serde(default)]
    pub updated_at: String,
}

impl Task {
    /// Create a task with default status and priority.
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            assigned_to: None,
            due_date: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Patches
// ─────────────────────────────────────────────────────────────────────────────

/// Field-level update for a [`Project`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    /// New progress percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// New budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New end date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl ProjectPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every present field to `project` and bump `updated_at`.
    pub fn apply_to(&self, project: &mut Project, at: Timestamp) {
        if let Some(name) = &self.name {
            project.name.clone_from(name);
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(progress) = self.progress {
            project.progress = progress.min(100);
        }
        if let Some(budget) = self.budget {
            project.budget = budget;
        }
        if let Some(description) = &self.description {
            project.description = Some(description.clone());
        }
        if let Some(end_date) = &self.end_date {
            project.end_date.clone_from(end_date);
        }
        project.updated_at = format_timestamp(at);
    }
}

/// Field-level update for a [`Task`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// New assignee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// New due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl TaskPatch {
    /// Patch that only changes the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every present field to `task` and bump `updated_at`.
    pub fn apply_to(&self, task: &mut Task, at: Timestamp) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = Some(assigned_to.clone());
        }
        if let Some(due_date) = &self.due_date {
            task.due_date = Some(due_date.clone());
        }
        task.updated_at = format_timestamp(at);
    }
}

/// Render epoch milliseconds as RFC 3339 with millisecond precision.
///
/// Out-of-range values render as an empty string.
pub fn format_timestamp(ms: Timestamp) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

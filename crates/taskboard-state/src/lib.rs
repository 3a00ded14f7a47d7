//! # taskboard-state
//!
//! Channel consumers for the dashboard. Each consumer subscribes to the
//! [`EventChannel`](taskboard_realtime::EventChannel) independently and
//! merges events into its own collection:
//!
//! - [`ProjectList`]: projects, per-entity last-write-wins
//! - [`TaskList`]: tasks for all projects or one project
//! - [`ActivityLog`]: bounded, newest-first feed of everything seen
//! - [`ConnectionIndicator`]: `Live` / `Connecting...` / `Offline`
//!
//! [`Dashboard`] composes them with one channel, initialized at startup and
//! torn down at shutdown.

#![deny(unsafe_code)]

pub mod activity;
pub mod dashboard;
pub mod errors;
pub mod indicator;
pub mod merge;
pub mod projects;
pub mod tasks;

pub use activity::{ActivityEntry, ActivityLog, describe};
pub use dashboard::{Dashboard, DashboardSummary, Seed};
pub use errors::EditError;
pub use indicator::{ConnectionIndicator, IndicatorStatus};
pub use merge::{Collection, Entity, Merge, MergeOutcome, Tracked, subscribe_state};
pub use projects::{ProjectList, ProjectState};
pub use tasks::{BulkUpdate, TaskList, TaskScope, TaskState};

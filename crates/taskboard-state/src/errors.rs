//! Errors from consumer-originated edits.

use taskboard_realtime::ChannelError;
use thiserror::Error;

/// A local edit could not be made or could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// No project with this ID in the list. Nothing changed.
    #[error("unknown project: {0}")]
    UnknownProject(String),
    /// No task with this ID in the list. Nothing changed.
    #[error("unknown task: {0}")]
    UnknownTask(String),
    /// A task with this ID already exists. Nothing changed.
    #[error("task already exists: {0}")]
    DuplicateTask(String),
    /// The task belongs to a project this list is not scoped to.
    #[error("task project {0} is outside this list's scope")]
    OutOfScope(String),
    /// The local edit was applied but the send failed. The edit is kept.
    #[error("edit applied locally but not sent: {0}")]
    Send(#[from] ChannelError),
}

impl EditError {
    /// Whether the local collection was changed before the failure.
    pub fn applied_locally(&self) -> bool {
        matches!(self, Self::Send(_))
    }
}

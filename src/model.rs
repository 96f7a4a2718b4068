//! Core data model: tasks, platforms, and work status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress state of a task. The only three states the tracker knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Not yet started.
    #[default]
    NotStarted,
    /// Currently being worked on.
    InProgress,
    /// Done.
    Completed,
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::InProgress => write!(f, "in progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// One tracked task.
///
/// All timestamps are UTC; conversion to local time happens only at
/// presentation boundaries (the due-today scan and the UI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    /// Store-assigned identifier. Zero until first persisted.
    pub id: i64,
    /// Task title.
    pub title: String,
    /// Optional reference to a [`Platform`].
    pub platform_id: Option<i64>,
    /// Current progress state.
    pub status: WorkStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Planned start time; auto-progression fires once this passes.
    pub start_at: Option<DateTime<Utc>>,
    /// Deadline.
    pub due_at: Option<DateTime<Utc>>,
    /// Completion time. Set iff `status == Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskItem {
    /// Create a new, not-yet-persisted task.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        platform_id: Option<i64>,
        start_at: Option<DateTime<Utc>>,
        due_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            platform_id,
            status: WorkStatus::NotStarted,
            created_at: Utc::now(),
            start_at,
            due_at,
            completed_at: None,
        }
    }
}

/// A platform (context) tasks can belong to, e.g. "work" or "personal".
///
/// Name uniqueness is enforced at the store boundary, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Store-assigned identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
}

//! Tasks, priorities and statuses
//!
//! A task's stored status only ever moves forward through
//! `created -> seen -> planned -> completed`. Being overdue is not stored by
//! this crate's writers; it is derived when a task is displayed, see
//! [`DisplayStatus::classify`].

use crate::error::ModelError;
use crate::ids::{FamilyId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Task priority, shown as a traffic-light colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// High
    Red,
    /// Medium
    Orange,
    /// Low
    #[default]
    Green,
}

impl TaskPriority {
    /// Stored representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Red => "red",
            TaskPriority::Orange => "orange",
            TaskPriority::Green => "green",
        }
    }

    /// Human label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TaskPriority::Red => "High",
            TaskPriority::Orange => "Medium",
            TaskPriority::Green => "Low",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(TaskPriority::Red),
            "orange" => Ok(TaskPriority::Orange),
            "green" => Ok(TaskPriority::Green),
            other => Err(ModelError::UnknownPriority(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored task status
///
/// `Overdue` exists so documents written by older clients still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Written by the parent, not yet viewed by the child
    Created,
    /// Viewed by the assigned child
    Seen,
    /// Child picked a completion time
    Planned,
    /// Terminal
    Completed,
    /// Legacy stored label
    Overdue,
}

impl TaskStatus {
    /// All stored statuses
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Created,
        TaskStatus::Seen,
        TaskStatus::Planned,
        TaskStatus::Completed,
        TaskStatus::Overdue,
    ];

    /// Stored representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Seen => "seen",
            TaskStatus::Planned => "planned",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
        }
    }

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl FromStr for TaskStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as read back from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned id
    pub id: TaskId,
    /// Owning family
    pub family_id: FamilyId,
    /// Short title
    pub title: String,
    /// Optional free text
    pub description: Option<String>,
    /// Priority colour
    pub priority: TaskPriority,
    /// Parent who created the task
    pub created_by: UserId,
    /// Child the task is assigned to
    pub assigned_to: UserId,
    /// Stored status
    pub status: TaskStatus,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the latest write
    pub last_modified: DateTime<Utc>,
    /// When the child first saw the task
    pub seen_at: Option<DateTime<Utc>>,
    /// When the child plans to be done
    pub planned_completion_time: Option<DateTime<Utc>>,
    /// When the child marked it done
    pub completed_at: Option<DateTime<Utc>>,
    /// Deadline, if any
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the stored status is terminal
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the task belongs to `user`
    #[inline]
    #[must_use]
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        &self.assigned_to == user
    }

    /// Status to display at `now`
    #[inline]
    #[must_use]
    pub fn display_status(&self, now: DateTime<Utc>) -> DisplayStatus {
        DisplayStatus::classify(self, now)
    }
}

/// Status as presented to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    /// Not yet seen
    Created,
    /// Seen, not planned
    Seen,
    /// Planned
    Planned,
    /// Done
    Completed,
    /// Not done and past its due date
    Overdue,
}

impl DisplayStatus {
    /// Classify a task at `now`
    ///
    /// Completed tasks are never overdue. A non-completed task is overdue
    /// when its due date lies strictly before `now`, or when an older client
    /// stored the `overdue` label.
    #[must_use]
    pub fn classify(task: &Task, now: DateTime<Utc>) -> Self {
        if task.is_completed() {
            return DisplayStatus::Completed;
        }
        if task.due_date.is_some_and(|due| due < now) {
            return DisplayStatus::Overdue;
        }
        match task.status {
            TaskStatus::Created => DisplayStatus::Created,
            TaskStatus::Seen => DisplayStatus::Seen,
            TaskStatus::Planned => DisplayStatus::Planned,
            TaskStatus::Completed => DisplayStatus::Completed,
            TaskStatus::Overdue => DisplayStatus::Overdue,
        }
    }
}

/// Parent input for creating a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Title, must be non-empty after trimming
    pub title: String,
    /// Optional description; blank text is dropped
    pub description: Option<String>,
    /// Priority colour
    pub priority: TaskPriority,
    /// Optional deadline
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Create a draft
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority,
            due_date: None,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With due date
    #[inline]
    #[must_use]
    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Trim and check the draft
    ///
    /// # Errors
    /// - `ModelError::EmptyTitle` if the title is blank
    pub fn validated(self) -> Result<Self, ModelError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ModelError::EmptyTitle);
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(Self {
            title,
            description,
            ..self
        })
    }
}

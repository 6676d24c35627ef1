//! Task boards
//!
//! Read-path partitions the dashboards render: open versus completed, each
//! task paired with the status it should display at a given instant.

use chrono::{DateTime, Utc};
use famtask_model::{DisplayStatus, Role, Task, TaskStatus, UserId, UserProfile};

/// A task with its display status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    /// The task as stored
    pub task: Task,
    /// What to show for it
    pub display: DisplayStatus,
}

impl BoardEntry {
    fn at(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            task: task.clone(),
            display: task.display_status(now),
        }
    }
}

fn partition<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    now: DateTime<Utc>,
) -> (Vec<BoardEntry>, Vec<BoardEntry>) {
    tasks
        .into_iter()
        .map(|t| BoardEntry::at(t, now))
        .partition(|e| !e.task.is_completed())
}

/// Parent view of every family task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentBoard {
    /// Not yet completed, in feed order
    pub active: Vec<BoardEntry>,
    /// Completed, in feed order
    pub completed: Vec<BoardEntry>,
}

impl ParentBoard {
    /// Partition a family's tasks
    #[must_use]
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let (active, completed) = partition(tasks, now);
        Self { active, completed }
    }

    /// Open tasks past their due date
    #[must_use]
    pub fn overdue_count(&self) -> usize {
        self.active
            .iter()
            .filter(|e| e.display == DisplayStatus::Overdue)
            .count()
    }
}

/// Child view of the tasks assigned to them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildBoard {
    /// Owner of the board
    pub child: UserId,
    /// Not yet completed, newest first
    pub active: Vec<BoardEntry>,
    /// Completed, in feed order
    pub completed: Vec<BoardEntry>,
}

impl ChildBoard {
    /// The child's tasks out of a family's list
    #[must_use]
    pub fn for_child(tasks: &[Task], child: &UserId, now: DateTime<Utc>) -> Self {
        let (mut active, completed) = partition(tasks.iter().filter(|t| t.is_assigned_to(child)), now);
        active.sort_by(|a, b| b.task.created_at.cmp(&a.task.created_at));
        Self {
            child: child.clone(),
            active,
            completed,
        }
    }

    /// Open tasks the child has not opened yet
    #[must_use]
    pub fn unseen_count(&self) -> usize {
        self.active
            .iter()
            .filter(|e| e.task.status == TaskStatus::Created)
            .count()
    }

    /// Every task on the board
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len() + self.completed.len()
    }

    /// Whether the board is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The child new tasks are assigned to: the lowest user id among children
#[must_use]
pub fn first_child(members: &[UserProfile]) -> Option<&UserProfile> {
    members
        .iter()
        .filter(|m| m.is(Role::Child))
        .min_by(|a, b| a.uid.cmp(&b.uid))
}

//! Task lifecycle engine
//!
//! Stored statuses move forward only:
//!
//! ```text
//! created -> seen -> planned -> completed
//!    |         \________^  ^        ^
//!    |___________|_________|________|
//! ```
//!
//! - `created -> seen` happens in bulk when a child's session sees new tasks
//! - `planned -> planned` re-plans
//! - any non-completed status may complete
//! - `overdue` is never written; see `DisplayStatus::classify`
//!
//! Every write carries a precondition on the status it was validated against.
//! When another client moved the task first, the engine re-reads and
//! re-validates, up to the configured retry limit.

use crate::documents::{self, collections, fields};
use crate::error::{FamilyTaskError, Result};
use chrono::{DateTime, Utc};
use famtask_model::{NewTask, Task, TaskId, TaskStatus, UserId, UserProfile};
use famtask_store::{Document, DocumentId, DocumentStore, Patch, Precondition, WriteBatch};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Statuses reachable from `from` in one write
#[must_use]
pub fn allowed_transitions(from: TaskStatus) -> Vec<TaskStatus> {
    use TaskStatus::{Completed, Created, Overdue, Planned, Seen};
    match from {
        Created => vec![Seen, Planned, Completed],
        Seen => vec![Planned, Completed],
        // legacy overdue label is treated like any other open task
        Planned | Overdue => vec![Planned, Completed],
        Completed => vec![],
    }
}

/// Check a single move against the table
///
/// # Errors
/// - `FamilyTaskError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(FamilyTaskError::IllegalTransition { from, to })
    }
}

/// What a plan/complete call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The task was written
    Applied,
    /// Already in the requested terminal state; nothing written
    Unchanged,
    /// No such task; nothing written
    Missing,
}

/// Writes lifecycle transitions to the task collection
#[derive(Debug, Clone)]
pub struct TaskLifecycle {
    store: Arc<dyn DocumentStore>,
    retry_limit: u32,
}

fn stored_status(doc: &Document) -> Result<TaskStatus> {
    let raw = doc
        .get(fields::STATUS)
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    Ok(raw.parse::<TaskStatus>()?)
}

impl TaskLifecycle {
    /// Engine over `store`, retrying lost compare-and-swaps `retry_limit` times
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, retry_limit: u32) -> Self {
        Self { store, retry_limit }
    }

    fn attempts(&self) -> u32 {
        self.retry_limit + 1
    }

    /// Create a task in the creator's family
    ///
    /// Without an explicit assignee the task goes to the family's first child
    /// by user id, the same pick as [`crate::board::first_child`].
    ///
    /// # Errors
    /// - `Model(EmptyTitle)` for a blank title
    /// - `NotInFamily` if the creator has no family
    /// - `NoChildInFamily` if there is nobody to assign to
    /// - `Validation` if `assigned_to` is not a child of the family
    pub async fn create_task(
        &self,
        creator: &UserProfile,
        assigned_to: Option<&UserId>,
        draft: NewTask,
    ) -> Result<TaskId> {
        let draft = draft.validated()?;
        let family_id = creator
            .family_id
            .clone()
            .ok_or_else(|| FamilyTaskError::NotInFamily {
                user_id: creator.uid.clone(),
            })?;

        let family_doc = self
            .store
            .get(collections::FAMILIES, &DocumentId::new(family_id.as_str()))
            .await?
            .ok_or_else(|| FamilyTaskError::NotInFamily {
                user_id: creator.uid.clone(),
            })?;
        let family = documents::decode_family(&family_doc)?;

        let assignee = match assigned_to {
            Some(child) if family.child_ids.contains(child) => child.clone(),
            Some(child) => {
                return Err(FamilyTaskError::Validation(format!(
                    "{child} is not a child of family {family_id}"
                )))
            }
            None => family
                .child_ids
                .iter()
                .min()
                .cloned()
                .ok_or_else(|| FamilyTaskError::NoChildInFamily {
                    family_id: family_id.clone(),
                })?,
        };

        let patch = documents::new_task_patch(&draft, &family_id, &creator.uid, &assignee);
        let id = self.store.add(collections::TASKS, patch).await?;
        tracing::info!(task = %id, family = %family_id, assignee = %assignee, "task created");
        Ok(TaskId::new(id.as_str()))
    }

    /// Move the viewer's `created` tasks to `seen` in one batch
    ///
    /// `tasks` may be stale; tasks that are no longer `created` are skipped.
    /// Returns how many tasks were written. An empty candidate set makes no
    /// store call at all.
    ///
    /// # Errors
    /// - boundary errors from the store
    /// - `Conflict` if other writers kept invalidating the batch
    pub async fn mark_seen(&self, viewer: &UserId, tasks: &[Task]) -> Result<usize> {
        let mut candidates: BTreeSet<DocumentId> = tasks
            .iter()
            .filter(|t| t.is_assigned_to(viewer) && t.status == TaskStatus::Created)
            .map(|t| DocumentId::new(t.id.as_str()))
            .collect();

        for attempt in 1..=self.attempts() {
            if candidates.is_empty() {
                tracing::debug!(viewer = %viewer, "no unseen tasks");
                return Ok(0);
            }

            let mut batch = WriteBatch::new();
            for id in &candidates {
                batch.update_with(
                    collections::TASKS,
                    id.clone(),
                    Patch::new()
                        .set(fields::STATUS, TaskStatus::Seen.as_str())
                        .server_timestamp(fields::SEEN_AT)
                        .server_timestamp(fields::LAST_MODIFIED),
                    Precondition::field_equals(fields::STATUS, TaskStatus::Created.as_str()),
                );
            }

            match self.store.commit(batch).await {
                Ok(()) => {
                    tracing::info!(viewer = %viewer, count = candidates.len(), "tasks marked seen");
                    return Ok(candidates.len());
                }
                Err(e) if e.is_conflict() || e.is_not_found() => {
                    tracing::debug!(viewer = %viewer, attempt, error = %e, "mark-seen batch invalidated");
                    candidates = self.still_unseen(viewer, candidates).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(FamilyTaskError::Conflict {
            target: format!("{}/<mark-seen>", collections::TASKS),
            attempts: self.attempts(),
        })
    }

    async fn still_unseen(
        &self,
        viewer: &UserId,
        candidates: BTreeSet<DocumentId>,
    ) -> Result<BTreeSet<DocumentId>> {
        let mut keep = BTreeSet::new();
        for id in candidates {
            let Some(doc) = self.store.get(collections::TASKS, &id).await? else {
                continue;
            };
            let assigned = doc.get(fields::ASSIGNED_TO).and_then(|v| v.as_str());
            if assigned == Some(viewer.as_str()) && stored_status(&doc)? == TaskStatus::Created {
                keep.insert(id);
            }
        }
        Ok(keep)
    }

    /// Record when the child plans to finish
    ///
    /// # Errors
    /// - `IllegalTransition` if the task is completed
    /// - boundary errors from the store
    /// - `Conflict` if other writers kept changing the status
    pub async fn plan(&self, task: &TaskId, when: DateTime<Utc>) -> Result<TransitionOutcome> {
        self.transition(task, TaskStatus::Planned, || {
            Patch::new()
                .set(fields::STATUS, TaskStatus::Planned.as_str())
                .set(fields::PLANNED_COMPLETION_TIME, documents::instant(when))
        })
        .await
    }

    /// Mark a task done
    ///
    /// Completing a completed task is a no-op and keeps its `completedAt`.
    ///
    /// # Errors
    /// - boundary errors from the store
    /// - `Conflict` if other writers kept changing the status
    pub async fn complete(&self, task: &TaskId) -> Result<TransitionOutcome> {
        self.transition(task, TaskStatus::Completed, || {
            Patch::new()
                .set(fields::STATUS, TaskStatus::Completed.as_str())
                .server_timestamp(fields::COMPLETED_AT)
        })
        .await
    }

    async fn transition<F>(&self, task: &TaskId, to: TaskStatus, build: F) -> Result<TransitionOutcome>
    where
        F: Fn() -> Patch + Send + Sync,
    {
        let id = DocumentId::new(task.as_str());
        for attempt in 1..=self.attempts() {
            let Some(doc) = self.store.get(collections::TASKS, &id).await? else {
                tracing::debug!(task = %task, to = %to, "transition on missing task ignored");
                return Ok(TransitionOutcome::Missing);
            };

            let from = stored_status(&doc)?;
            if from.is_terminal() && from == to {
                tracing::debug!(task = %task, "task already completed");
                return Ok(TransitionOutcome::Unchanged);
            }
            validate_transition(from, to)?;

            let patch = build().server_timestamp(fields::LAST_MODIFIED);
            let guard = Precondition::field_equals(fields::STATUS, from.as_str());
            match self
                .store
                .update_with(collections::TASKS, &id, patch, guard)
                .await
            {
                Ok(_) => {
                    tracing::info!(task = %task, from = %from, to = %to, "task transitioned");
                    return Ok(TransitionOutcome::Applied);
                }
                Err(e) if e.is_not_found() => return Ok(TransitionOutcome::Missing),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(task = %task, attempt, "status changed underneath, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(FamilyTaskError::Conflict {
            target: format!("{}/{task}", collections::TASKS),
            attempts: self.attempts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = TaskStatus> {
        proptest::sample::select(TaskStatus::ALL.to_vec())
    }

    #[test]
    fn table_matches_lifecycle() {
        assert!(validate_transition(TaskStatus::Created, TaskStatus::Seen).is_ok());
        assert!(validate_transition(TaskStatus::Seen, TaskStatus::Planned).is_ok());
        assert!(validate_transition(TaskStatus::Planned, TaskStatus::Planned).is_ok());
        assert!(validate_transition(TaskStatus::Planned, TaskStatus::Completed).is_ok());
        assert!(validate_transition(TaskStatus::Seen, TaskStatus::Seen).is_err());
        assert!(matches!(
            validate_transition(TaskStatus::Completed, TaskStatus::Planned),
            Err(FamilyTaskError::IllegalTransition {
                from: TaskStatus::Completed,
                to: TaskStatus::Planned
            })
        ));
    }

    proptest! {
        #[test]
        fn nothing_leaves_completed(to in any_status()) {
            prop_assert!(validate_transition(TaskStatus::Completed, to).is_err());
        }

        #[test]
        fn nothing_targets_created_or_overdue(from in any_status()) {
            let targets = allowed_transitions(from);
            prop_assert!(!targets.contains(&TaskStatus::Created));
            prop_assert!(!targets.contains(&TaskStatus::Overdue));
        }

        #[test]
        fn every_open_status_can_complete(from in any_status()) {
            prop_assume!(!from.is_terminal());
            prop_assert!(validate_transition(from, TaskStatus::Completed).is_ok());
        }
    }
}

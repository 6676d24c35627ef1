//! Lifecycle engine against the in-memory store

use chrono::Duration;
use famtask_core::documents::{collections, decode_task, fields};
use famtask_core::{ErrorKind, FamilyTaskError, TaskLifecycle, TransitionOutcome};
use famtask_model::{NewTask, Role, Task, TaskId, TaskPriority, TaskStatus, UserId};
use famtask_store::{DocumentId, DocumentStore, Patch};
use famtask_test_utils::{chore, epoch, harness, ContendedStore, Harness};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn status(to: TaskStatus) -> Patch {
    Patch::new().set(fields::STATUS, to.as_str())
}

async fn load(h: &Harness, id: &TaskId) -> Task {
    let doc = h
        .store
        .get(collections::TASKS, &DocumentId::new(id.as_str()))
        .await
        .unwrap()
        .unwrap();
    decode_task(&doc).unwrap()
}

fn all_tasks(h: &Harness) -> Vec<Task> {
    h.store
        .documents(collections::TASKS)
        .iter()
        .map(|d| decode_task(d).unwrap())
        .collect()
}

#[tokio::test]
async fn created_task_reads_back_for_first_child() {
    let h = harness();
    let seeded = h.seed_family().await;

    let draft = NewTask::new("  Clean room  ", TaskPriority::Red).with_description("Under the bed too");
    let id = h.service.create_task(&seeded.parent, None, draft).await.unwrap();

    let task = load(&h, &id).await;
    assert_eq!(task.title, "Clean room");
    assert_eq!(task.description.as_deref(), Some("Under the bed too"));
    assert_eq!(task.priority, TaskPriority::Red);
    assert_eq!(task.status, TaskStatus::Created);
    assert_eq!(&task.family_id, seeded.family_id());
    assert_eq!(task.created_by, seeded.parent.uid);
    assert_eq!(task.assigned_to, seeded.child.uid);
    assert!(task.created_at >= epoch());
    assert_eq!(task.last_modified, task.created_at);
    assert!(task.seen_at.is_none());
    assert!(task.completed_at.is_none());
}

#[tokio::test]
async fn mark_seen_writes_once_and_tolerates_stale_lists() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "Homework").await;
    h.add_task(&seeded, "Feed the cat").await;
    let stale = all_tasks(&h);

    let lifecycle = h.service.lifecycle();
    assert_eq!(lifecycle.mark_seen(&seeded.child.uid, &stale).await.unwrap(), 2);
    // same list again: every candidate is already seen
    assert_eq!(lifecycle.mark_seen(&seeded.child.uid, &stale).await.unwrap(), 0);

    for task in all_tasks(&h) {
        assert_eq!(task.status, TaskStatus::Seen);
        let seen_at = task.seen_at.unwrap();
        assert!(seen_at >= task.created_at);
        assert_eq!(task.last_modified, seen_at);
    }
}

#[tokio::test]
async fn mark_seen_ignores_tasks_of_other_users() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "Homework").await;
    let before = h.store.sequence();

    let written = h
        .service
        .lifecycle()
        .mark_seen(&seeded.parent.uid, &all_tasks(&h))
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(h.store.sequence(), before);
    assert_eq!(all_tasks(&h)[0].status, TaskStatus::Created);
}

#[tokio::test]
async fn completion_is_terminal() {
    let h = harness();
    let seeded = h.seed_family().await;
    let id = h.add_task(&seeded, "Take out the trash").await;

    let outcome = h.service.complete_task(&id).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::Applied);
    let first = load(&h, &id).await;
    assert_eq!(first.status, TaskStatus::Completed);
    let completed_at = first.completed_at.unwrap();

    h.clock.advance(Duration::hours(3));
    let again = h.service.complete_task(&id).await.unwrap();
    assert_eq!(again, TransitionOutcome::Unchanged);
    assert_eq!(load(&h, &id).await.completed_at, Some(completed_at));

    let err = h
        .service
        .plan_task(&id, epoch() + Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FamilyTaskError::IllegalTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::Planned
        }
    ));
    assert_eq!(load(&h, &id).await.status, TaskStatus::Completed);
}

#[tokio::test]
async fn plan_can_be_repeated() {
    let h = harness();
    let seeded = h.seed_family().await;
    let id = h.add_task(&seeded, "Practice piano").await;

    let first = epoch() + Duration::hours(1);
    let second = epoch() + Duration::hours(4);
    assert_eq!(h.service.plan_task(&id, first).await.unwrap(), TransitionOutcome::Applied);
    assert_eq!(h.service.plan_task(&id, second).await.unwrap(), TransitionOutcome::Applied);

    let task = load(&h, &id).await;
    assert_eq!(task.status, TaskStatus::Planned);
    assert_eq!(task.planned_completion_time, Some(second));

    h.service.complete_task(&id).await.unwrap();
    assert_eq!(load(&h, &id).await.status, TaskStatus::Completed);
}

#[tokio::test]
async fn transitions_on_missing_task_write_nothing() {
    let h = harness();
    h.seed_family().await;
    let before = h.store.sequence();
    let ghost = TaskId::new("no-such-task");

    assert_eq!(h.service.complete_task(&ghost).await.unwrap(), TransitionOutcome::Missing);
    assert_eq!(
        h.service.plan_task(&ghost, epoch()).await.unwrap(),
        TransitionOutcome::Missing
    );
    assert_eq!(h.store.sequence(), before);
}

#[tokio::test]
async fn family_without_child_cannot_get_tasks() {
    let h = harness();
    let parent = h.member("solo@example.com", Role::Parent).await;
    h.service.create_family(&parent).await.unwrap();
    let parent = h.reload(&parent.uid).await;

    let err = h
        .service
        .create_task(&parent, None, chore("Homework"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoChildInFamily);
    assert!(h.store.documents(collections::TASKS).is_empty());
}

#[tokio::test]
async fn task_creation_validates_input_and_roles() {
    let h = harness();
    let seeded = h.seed_family().await;

    let blank = h
        .service
        .create_task(&seeded.parent, None, chore("   "))
        .await
        .unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::Validation);

    let stranger = UserId::new("not-a-member");
    let wrong_assignee = h
        .service
        .create_task(&seeded.parent, Some(&stranger), chore("Homework"))
        .await
        .unwrap_err();
    assert_eq!(wrong_assignee.kind(), ErrorKind::Validation);

    let by_child = h
        .service
        .create_task(&seeded.child, None, chore("Homework"))
        .await
        .unwrap_err();
    assert_eq!(by_child.kind(), ErrorKind::Validation);

    let explicit = h
        .service
        .create_task(&seeded.parent, Some(&seeded.child.uid), chore("Homework"))
        .await
        .unwrap();
    assert_eq!(load(&h, &explicit).await.assigned_to, seeded.child.uid);
}

#[tokio::test]
async fn duplicate_submission_is_busy() {
    let h = harness();
    let seeded = h.seed_family().await;

    let token = h
        .service
        .guard()
        .begin(format!("create-task:{}", seeded.parent.uid))
        .unwrap();
    let err = h
        .service
        .create_task(&seeded.parent, None, chore("Homework"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    drop(token);

    assert!(h
        .service
        .create_task(&seeded.parent, None, chore("Homework"))
        .await
        .is_ok());
}

#[tokio::test]
async fn offline_store_surfaces_as_network_error() {
    let h = harness();
    let seeded = h.seed_family().await;
    let id = h.add_task(&seeded, "Homework").await;

    h.store.set_offline(true);
    let err = h.service.complete_task(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);

    h.store.set_offline(false);
    assert_eq!(load(&h, &id).await.status, TaskStatus::Created);
}

#[tokio::test]
async fn lost_race_revalidates_against_the_winner() {
    let h = harness();
    let seeded = h.seed_family().await;
    let id = h.add_task(&seeded, "Homework").await;

    // the child completes on another device while this one plans
    let store = Arc::new(
        ContendedStore::new(h.store.clone(), collections::TASKS).rival(status(TaskStatus::Completed)),
    );
    let lifecycle = TaskLifecycle::new(store.clone(), 3);
    let err = lifecycle
        .plan(&id, epoch() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FamilyTaskError::IllegalTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::Planned
        }
    ));
    assert_eq!(store.landed(), 1);
    let task = load(&h, &id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.planned_completion_time.is_none());
}

#[tokio::test]
async fn lost_race_retries_when_still_legal() {
    let h = harness();
    let seeded = h.seed_family().await;
    let id = h.add_task(&seeded, "Homework").await;

    let store = Arc::new(
        ContendedStore::new(h.store.clone(), collections::TASKS).rival(status(TaskStatus::Seen)),
    );
    let lifecycle = TaskLifecycle::new(store.clone(), 3);
    assert_eq!(lifecycle.complete(&id).await.unwrap(), TransitionOutcome::Applied);
    assert_eq!(store.landed(), 1);
    assert_eq!(load(&h, &id).await.status, TaskStatus::Completed);
}

#[tokio::test]
async fn endless_contention_gives_up_with_conflict() {
    let h = harness();
    let seeded = h.seed_family().await;
    let id = h.add_task(&seeded, "Homework").await;

    // every attempt reads one status and finds another on write
    let store = Arc::new(
        ContendedStore::new(h.store.clone(), collections::TASKS)
            .rival(status(TaskStatus::Seen))
            .rival(status(TaskStatus::Created))
            .rival(status(TaskStatus::Seen))
            .rival(status(TaskStatus::Created)),
    );
    let lifecycle = TaskLifecycle::new(store.clone(), 2);
    let err = lifecycle.complete(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, FamilyTaskError::Conflict { attempts: 3, .. }));
    assert_eq!(store.landed(), 3);
    assert_eq!(store.pending(), 1);
    assert_eq!(load(&h, &id).await.status, TaskStatus::Seen);
}

//! Realtime family feeds and child sessions

use famtask_core::documents::{collections, fields};
use famtask_core::{task_feed, ErrorKind, FamilyFeed, FeedUpdate, LoadState};
use famtask_model::{Role, TaskStatus};
use famtask_store::{DocumentStore, Patch};
use famtask_test_utils::harness;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn feed_loads_tasks_newest_first_and_members() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "First").await;
    h.add_task(&seeded, "Second").await;

    let mut feed = h.service.family_feed(Some(seeded.family_id().clone())).unwrap();
    assert_eq!(feed.state(), &LoadState::Loading);
    assert_eq!(timeout(WAIT, feed.wait_ready()).await.unwrap(), &LoadState::Ready);

    let titles: Vec<_> = feed.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Second", "First"]);

    let mut members: Vec<_> = feed.members().iter().map(|m| m.uid.clone()).collect();
    members.sort();
    let mut expected = vec![seeded.parent.uid.clone(), seeded.child.uid.clone()];
    expected.sort();
    assert_eq!(members, expected);
}

#[tokio::test]
async fn feed_follows_new_tasks() {
    let h = harness();
    let seeded = h.seed_family().await;
    let mut feed = h.service.family_feed(Some(seeded.family_id().clone())).unwrap();
    timeout(WAIT, feed.wait_ready()).await.unwrap();
    assert!(feed.tasks().is_empty());

    h.add_task(&seeded, "Water the plants").await;
    let update = timeout(WAIT, feed.refresh()).await.unwrap();
    assert_eq!(update, Some(FeedUpdate::Tasks));
    assert_eq!(feed.tasks().len(), 1);
    assert_eq!(feed.tasks()[0].title, "Water the plants");
}

#[tokio::test]
async fn closing_feed_releases_subscriptions() {
    let h = harness();
    let seeded = h.seed_family().await;

    let feed = h.service.family_feed(Some(seeded.family_id().clone())).unwrap();
    assert_eq!(h.store.subscriber_count(), 2);
    drop(feed);
    assert_eq!(h.store.subscriber_count(), 0);

    let mut feed = h.service.family_feed(Some(seeded.family_id().clone())).unwrap();
    feed.close();
    assert_eq!(h.store.subscriber_count(), 0);
}

#[tokio::test]
async fn switching_family_replaces_subscriptions() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "Homework").await;
    let other_parent = h.member("other@example.com", Role::Parent).await;
    let other = h.service.create_family(&other_parent).await.unwrap();

    let mut feed = h.service.family_feed(Some(seeded.family_id().clone())).unwrap();
    timeout(WAIT, feed.wait_ready()).await.unwrap();
    assert_eq!(feed.tasks().len(), 1);

    feed.switch_family(Some(other.family_id.clone()));
    assert_eq!(h.store.subscriber_count(), 2);
    assert_eq!(feed.family_id(), Some(&other.family_id));
    assert!(feed.tasks().is_empty());
    timeout(WAIT, feed.wait_ready()).await.unwrap();
    assert!(feed.tasks().is_empty());
    assert_eq!(feed.members().len(), 1);

    feed.switch_family(None);
    assert_eq!(h.store.subscriber_count(), 0);
    assert_eq!(feed.state(), &LoadState::Ready);
    assert!(feed.refresh().await.is_none());
}

#[tokio::test]
async fn malformed_task_is_skipped() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "Good one").await;
    h.store
        .add(
            collections::TASKS,
            Patch::new()
                .set(fields::FAMILY_ID, seeded.family_id().as_str())
                .set(fields::TITLE, "Broken")
                .set(fields::STATUS, "misplaced")
                .server_timestamp(fields::CREATED_AT),
        )
        .await
        .unwrap();

    let store: Arc<dyn DocumentStore> = h.store.clone();
    let mut tasks = task_feed(store.as_ref(), seeded.family_id()).unwrap();
    let first = timeout(WAIT, tasks.next()).await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].title, "Good one");
    assert_eq!(tasks.current().len(), 1);
    tasks.close();
    assert_eq!(h.store.subscriber_count(), 0);
}

#[tokio::test]
async fn offline_store_fails_the_feed() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.store.set_offline(true);

    let mut feed = FamilyFeed::open(h.store.clone(), Some(seeded.family_id().clone()));
    assert!(matches!(feed.state(), LoadState::Failed(_)));
    assert_eq!(h.store.subscriber_count(), 0);
    assert!(matches!(feed.wait_ready().await, LoadState::Failed(_)));
}

#[tokio::test]
async fn failed_feed_recovers_once_store_is_back() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "Homework").await;
    let family = seeded.family_id().clone();

    h.store.set_offline(true);
    let mut feed = FamilyFeed::open(h.store.clone(), Some(family.clone()));
    assert!(matches!(feed.state(), LoadState::Failed(_)));
    h.store.set_offline(false);

    feed.switch_family(Some(family.clone()));
    assert_eq!(h.store.subscriber_count(), 2);
    assert_eq!(feed.state(), &LoadState::Loading);
    assert_eq!(timeout(WAIT, feed.wait_ready()).await.unwrap(), &LoadState::Ready);
    assert_eq!(feed.tasks().len(), 1);

    // a ready feed ignores a switch to the same family
    feed.switch_family(Some(family.clone()));
    assert_eq!(feed.state(), &LoadState::Ready);
    assert_eq!(feed.tasks().len(), 1);

    h.store.set_offline(true);
    feed.reopen();
    assert!(matches!(feed.state(), LoadState::Failed(_)));
    assert_eq!(h.store.subscriber_count(), 0);
    h.store.set_offline(false);
    feed.reopen();
    assert_eq!(timeout(WAIT, feed.wait_ready()).await.unwrap(), &LoadState::Ready);
    assert_eq!(feed.family_id(), Some(&family));
}

#[tokio::test]
async fn closed_store_ends_the_feed() {
    let h = harness();
    let seeded = h.seed_family().await;
    let mut feed = h.service.family_feed(Some(seeded.family_id().clone())).unwrap();
    timeout(WAIT, feed.wait_ready()).await.unwrap();

    h.store.close();
    assert!(timeout(WAIT, feed.refresh()).await.unwrap().is_none());
    assert!(matches!(feed.state(), LoadState::Failed(_)));
}

#[tokio::test]
async fn child_session_marks_new_tasks_seen() {
    let h = harness();
    let seeded = h.seed_family().await;
    h.add_task(&seeded, "Homework").await;
    h.add_task(&seeded, "Clean room").await;

    let mut session = h.service.child_session(&seeded.child).unwrap();
    timeout(WAIT, session.wait_ready()).await.unwrap().unwrap();
    assert_eq!(session.marked_seen(), 2);
    for doc in h.store.documents(collections::TASKS) {
        assert_eq!(doc.get(fields::STATUS).and_then(|v| v.as_str()), Some("seen"));
    }

    h.add_task(&seeded, "Feed the cat").await;
    timeout(WAIT, async {
        while session.marked_seen() < 3 {
            session.refresh().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(session.marked_seen(), 3);
    assert!(h
        .store
        .documents(collections::TASKS)
        .iter()
        .all(|d| d.get(fields::STATUS).and_then(|v| v.as_str()) == Some("seen")));
}

#[tokio::test]
async fn child_board_splits_active_and_completed() {
    let h = harness();
    let seeded = h.seed_family().await;
    let done = h.add_task(&seeded, "Homework").await;
    h.add_task(&seeded, "Clean room").await;
    h.service.complete_task(&done).await.unwrap();

    let mut session = h.service.child_session(&seeded.child).unwrap();
    timeout(WAIT, session.wait_ready()).await.unwrap().unwrap();
    let board = session.board(famtask_test_utils::epoch());
    assert_eq!(board.active.len(), 1);
    assert_eq!(board.active[0].task.title, "Clean room");
    assert_eq!(board.completed.len(), 1);
    assert_eq!(board.completed[0].task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn child_without_family_has_no_session() {
    let h = harness();
    let kid = h.member("kid@example.com", Role::Child).await;
    let err = h.service.child_session(&kid).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotInFamily);
}

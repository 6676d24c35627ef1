//! Family creation and invite-code joins

use famtask_core::documents::{collections, decode_family, fields, new_family_patch};
use famtask_core::{ChildBoard, ErrorKind, FamilyMembership, FamilyTaskError};
use famtask_model::{
    Family, FamilyId, InviteCode, NewTask, Role, TaskPriority, TaskStatus, UserId,
};
use famtask_store::{DocumentId, DocumentStore, Patch};
use famtask_test_utils::{epoch, harness, ContendedStore, Harness};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::sync::Arc;

const CODE_SEED: u64 = 11;

async fn family(h: &Harness, id: &FamilyId) -> Family {
    let doc = h
        .store
        .get(collections::FAMILIES, &DocumentId::new(id.as_str()))
        .await
        .unwrap()
        .unwrap();
    decode_family(&doc).unwrap()
}

#[tokio::test]
async fn parent_creates_family_with_readable_code() {
    let h = harness();
    let parent = h.member("mom@example.com", Role::Parent).await;

    let created = h.service.create_family(&parent).await.unwrap();
    let pattern = Regex::new("^[A-HJ-NP-Z2-9]{6}$").unwrap();
    assert!(pattern.is_match(created.invite_code.as_str()), "{}", created.invite_code);

    let stored = family(&h, &created.family_id).await;
    assert_eq!(stored.parent_ids, vec![parent.uid.clone()]);
    assert!(stored.child_ids.is_empty());
    assert_eq!(stored.invite_code, created.invite_code);

    let parent = h.reload(&parent.uid).await;
    assert_eq!(parent.family_id.as_ref(), Some(&created.family_id));
    assert_eq!(
        h.service.membership().invite_code_of(&created.family_id).await.unwrap(),
        Some(created.invite_code)
    );
}

#[tokio::test]
async fn child_joins_with_sloppy_input() {
    let h = harness();
    let parent = h.member("mom@example.com", Role::Parent).await;
    let created = h.service.create_family(&parent).await.unwrap();
    let child = h.member("kid@example.com", Role::Child).await;

    let typed = format!("  {}\n", created.invite_code.as_str().to_lowercase());
    let joined = h.service.join_family(&child, &typed).await.unwrap();
    assert_eq!(joined, created.family_id);

    let stored = family(&h, &joined).await;
    assert_eq!(stored.child_ids, vec![child.uid.clone()]);
    assert_eq!(stored.role_of(&child.uid), Some(Role::Child));
    assert_eq!(h.reload(&child.uid).await.family_id, Some(joined));
}

#[tokio::test]
async fn unknown_or_malformed_codes_change_nothing() {
    let h = harness();
    let seeded = h.seed_family().await;
    let kid = h.member("other@example.com", Role::Child).await;
    let before = family(&h, seeded.family_id()).await;

    let unknown = if seeded.family.invite_code.as_str() == "ZZZZZZ" {
        "YYYYYY"
    } else {
        "ZZZZZZ"
    };
    for code in [unknown, "abc", "", "ABCDE0"] {
        let err = h.service.join_family(&kid, code).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInviteCode, "code {code:?}");
    }

    assert!(h.reload(&kid.uid).await.family_id.is_none());
    assert_eq!(family(&h, seeded.family_id()).await, before);
}

#[tokio::test]
async fn rejoining_is_idempotent() {
    let h = harness();
    let seeded = h.seed_family().await;

    let again = h
        .service
        .join_family(&seeded.child, seeded.family.invite_code.as_str())
        .await
        .unwrap();
    assert_eq!(&again, seeded.family_id());
    assert_eq!(family(&h, seeded.family_id()).await.child_ids, vec![seeded.child.uid.clone()]);
}

#[tokio::test]
async fn second_parent_joins_parent_list() {
    let h = harness();
    let seeded = h.seed_family().await;
    let dad = h.member("dad@example.com", Role::Parent).await;

    h.service
        .join_family(&dad, seeded.family.invite_code.as_str())
        .await
        .unwrap();
    let stored = family(&h, seeded.family_id()).await;
    assert_eq!(stored.parent_ids, vec![seeded.parent.uid.clone(), dad.uid.clone()]);
    assert_eq!(stored.child_ids, vec![seeded.child.uid.clone()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_all_land() {
    let h = harness();
    let seeded = h.seed_family().await;
    let code = seeded.family.invite_code.as_str().to_string();

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let membership = h.service.membership().clone();
            let code = code.clone();
            tokio::spawn(async move {
                membership
                    .join_family(&code, &UserId::new(format!("kid-{i}")), Role::Child)
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = family(&h, seeded.family_id()).await;
    assert_eq!(stored.child_ids.len(), 6);
    for i in 0..5 {
        assert!(stored.child_ids.contains(&UserId::new(format!("kid-{i}"))));
    }
}

#[tokio::test]
async fn roles_gate_family_setup() {
    let h = harness();
    let kid = h.member("kid@example.com", Role::Child).await;
    let err = h.service.create_family(&kid).await.unwrap_err();
    assert!(matches!(err, FamilyTaskError::Validation(_)));

    let undecided = h
        .service
        .sign_up("new@example.com", "secret-pass", None)
        .await
        .unwrap();
    let err = h.service.join_family(&undecided, "ABCDEF").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn moving_family_repoints_profile() {
    let h = harness();
    let seeded = h.seed_family().await;
    let other_parent = h.member("other@example.com", Role::Parent).await;
    let other = h.service.create_family(&other_parent).await.unwrap();

    h.service
        .join_family(&seeded.child, other.invite_code.as_str())
        .await
        .unwrap();
    assert_eq!(h.reload(&seeded.child.uid).await.family_id, Some(other.family_id.clone()));
    // member lists only grow
    assert!(family(&h, seeded.family_id()).await.contains(&seeded.child.uid));
    assert!(family(&h, &other.family_id).await.contains(&seeded.child.uid));
}

#[tokio::test]
async fn parent_to_child_scenario() {
    let h = harness();
    let parent = h.member("mom@example.com", Role::Parent).await;
    let created = h.service.create_family(&parent).await.unwrap();
    let child = h.member("kid@example.com", Role::Child).await;
    h.service
        .join_family(&child, &created.invite_code.as_str().to_lowercase())
        .await
        .unwrap();
    let parent = h.reload(&parent.uid).await;
    let child = h.reload(&child.uid).await;
    assert_eq!(child.family_id.as_ref(), Some(&created.family_id));

    h.service
        .create_task(
            &parent,
            Some(&child.uid),
            NewTask::new("Clean room", TaskPriority::Green),
        )
        .await
        .unwrap();

    let mut feed = h.service.family_feed(child.family_id.clone()).unwrap();
    feed.wait_ready().await;
    let board = ChildBoard::for_child(feed.tasks(), &child.uid, epoch());
    assert_eq!(board.len(), 1);
    let task = &board.active[0].task;
    assert_eq!(task.status, TaskStatus::Created);
    assert!(task.seen_at.is_none());
    assert!(task.planned_completion_time.is_none());
    assert!(task.completed_at.is_none());
}

#[tokio::test]
async fn taken_invite_code_is_drawn_again() {
    let h = harness();
    let parent = h.member("mom@example.com", Role::Parent).await;
    let mut upcoming = StdRng::seed_from_u64(CODE_SEED);
    let taken = InviteCode::generate(&mut upcoming);
    let fresh = InviteCode::generate(&mut upcoming);
    h.store
        .add(collections::FAMILIES, new_family_patch(&UserId::new("elsewhere"), &taken))
        .await
        .unwrap();

    let membership = FamilyMembership::new(h.store.clone(), 3, 3)
        .with_code_source(StdRng::seed_from_u64(CODE_SEED));
    let created = membership.create_family(&parent.uid).await.unwrap();
    assert_eq!(created.invite_code, fresh);
    assert_eq!(family(&h, &created.family_id).await.invite_code, fresh);
    assert_eq!(h.store.documents(collections::FAMILIES).len(), 2);
}

#[tokio::test]
async fn running_out_of_invite_codes_is_a_conflict() {
    let h = harness();
    let parent = h.member("mom@example.com", Role::Parent).await;
    let taken = InviteCode::generate(&mut StdRng::seed_from_u64(CODE_SEED));
    h.store
        .add(collections::FAMILIES, new_family_patch(&UserId::new("elsewhere"), &taken))
        .await
        .unwrap();

    let membership = FamilyMembership::new(h.store.clone(), 3, 1)
        .with_code_source(StdRng::seed_from_u64(CODE_SEED));
    let err = membership.create_family(&parent.uid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, FamilyTaskError::Conflict { attempts: 1, .. }));
    assert_eq!(h.store.documents(collections::FAMILIES).len(), 1);
    assert!(h.reload(&parent.uid).await.family_id.is_none());
}

#[tokio::test]
async fn join_rereads_family_after_losing_the_swap() {
    let h = harness();
    let seeded = h.seed_family().await;
    let code = seeded.family.invite_code.clone();
    let kid = h.member("second@example.com", Role::Child).await;

    let store = Arc::new(
        ContendedStore::new(h.store.clone(), collections::FAMILIES)
            .rival(Patch::new().set(fields::INVITE_CODE, code.as_str())),
    );
    let membership = FamilyMembership::new(store.clone(), 1, 3);
    let joined = membership
        .join_family(code.as_str(), &kid.uid, Role::Child)
        .await
        .unwrap();
    assert_eq!(&joined, seeded.family_id());
    assert_eq!(store.landed(), 1);
    assert_eq!(
        family(&h, seeded.family_id()).await.child_ids,
        vec![seeded.child.uid.clone(), kid.uid.clone()]
    );
}

#[tokio::test]
async fn join_gives_up_after_retry_limit() {
    let h = harness();
    let seeded = h.seed_family().await;
    let code = seeded.family.invite_code.clone();
    let kid = h.member("second@example.com", Role::Child).await;
    let before = family(&h, seeded.family_id()).await;

    let touch = Patch::new().set(fields::INVITE_CODE, code.as_str());
    let store = Arc::new(
        ContendedStore::new(h.store.clone(), collections::FAMILIES)
            .rival(touch.clone())
            .rival(touch),
    );
    let membership = FamilyMembership::new(store.clone(), 1, 3);
    let err = membership
        .join_family(code.as_str(), &kid.uid, Role::Child)
        .await
        .unwrap_err();
    assert!(matches!(err, FamilyTaskError::Conflict { attempts: 2, .. }));
    assert_eq!(store.landed(), 2);
    assert_eq!(family(&h, seeded.family_id()).await.child_ids, before.child_ids);
    assert!(h.reload(&kid.uid).await.family_id.is_none());
}

//! Testing utilities for the famtask workspace
//!
//! Shared fixtures: a service over in-memory backends with a hand-driven
//! clock, a seeded parent/child family, task builders, and a store that
//! loses guarded writes to a rival client on demand.

#![allow(missing_docs)]

mod contended;

pub use contended::ContendedStore;

use chrono::{DateTime, TimeZone, Utc};
use famtask_core::{CreatedFamily, FamilyTaskService, MemoryAuth, MemoryPush, ServiceConfig};
use famtask_model::{
    FamilyId, NewTask, Role, Task, TaskId, TaskPriority, TaskStatus, UserId, UserProfile,
};
use famtask_store::{ManualClock, MemoryStore};
use std::sync::Arc;

pub const TEST_TOKEN: &str = "test-device-token";
pub const TEST_PASSWORD: &str = "secret-pass";

/// Fixed start of every test clock
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn frozen_store() -> (Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(epoch()));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    (store, clock)
}

/// Service plus concrete handles to its backends
pub struct Harness {
    pub service: FamilyTaskService,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<MemoryAuth>,
    pub push: Arc<MemoryPush>,
    pub clock: Arc<ManualClock>,
}

pub struct SeededFamily {
    pub parent: UserProfile,
    pub child: UserProfile,
    pub family: CreatedFamily,
}

impl SeededFamily {
    pub fn family_id(&self) -> &FamilyId {
        &self.family.family_id
    }
}

pub fn harness() -> Harness {
    harness_with_push(MemoryPush::new(TEST_TOKEN))
}

pub fn harness_with_push(push: MemoryPush) -> Harness {
    let (store, clock) = frozen_store();
    let auth = Arc::new(MemoryAuth::new());
    let push = Arc::new(push);
    let service = FamilyTaskService::init(
        ServiceConfig::local(),
        store.clone(),
        auth.clone(),
        push.clone(),
    )
    .unwrap();
    Harness {
        service,
        store,
        auth,
        push,
        clock,
    }
}

impl Harness {
    /// Sign up `email` and pick `role`
    pub async fn member(&self, email: &str, role: Role) -> UserProfile {
        let profile = self
            .service
            .sign_up(email, TEST_PASSWORD, None)
            .await
            .unwrap();
        self.service.select_role(&profile.uid, role).await.unwrap()
    }

    pub async fn reload(&self, user: &UserId) -> UserProfile {
        self.service.profiles().profile(user).await.unwrap().unwrap()
    }

    /// A parent with a family and one child who joined it
    pub async fn seed_family(&self) -> SeededFamily {
        let parent = self.member("parent@example.com", Role::Parent).await;
        let family = self.service.create_family(&parent).await.unwrap();
        let child = self.member("child@example.com", Role::Child).await;
        self.service
            .join_family(&child, family.invite_code.as_str())
            .await
            .unwrap();
        SeededFamily {
            parent: self.reload(&parent.uid).await,
            child: self.reload(&child.uid).await,
            family,
        }
    }

    pub async fn add_task(&self, seeded: &SeededFamily, title: &str) -> TaskId {
        self.service
            .create_task(&seeded.parent, None, chore(title))
            .await
            .unwrap()
    }
}

pub fn chore(title: &str) -> NewTask {
    NewTask::new(title, TaskPriority::Orange)
}

/// Task value for pure board and classification tests
pub fn sample_task(id: &str, assigned_to: &str, status: TaskStatus, created_at: DateTime<Utc>) -> Task {
    Task {
        id: TaskId::new(id),
        family_id: FamilyId::new("fam-1"),
        title: format!("Task {id}"),
        description: None,
        priority: TaskPriority::Green,
        created_by: UserId::new("parent-1"),
        assigned_to: UserId::new(assigned_to),
        status,
        created_at,
        last_modified: created_at,
        seen_at: None,
        planned_completion_time: None,
        completed_at: None,
        due_date: None,
    }
}

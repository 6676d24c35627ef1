//! Family task service
//!
//! Parents create tasks, children plan and complete them, and every client
//! watches the same state through realtime snapshots of a document store.
//!
//! # Architecture
//!
//! - **Lifecycle** ([`lifecycle`]): `created -> seen -> planned -> completed`
//!   with compare-and-swap guarded writes
//! - **Membership** ([`membership`]): family creation and invite-code joins
//! - **Profiles** ([`profile`]): first sign-in profiles and role selection
//! - **Feeds** ([`feed`]): live task and member views per family
//! - **Boundaries**: [`famtask_store::DocumentStore`], [`auth::AuthProvider`],
//!   [`notify::PushMessaging`]
//! - **Read path** ([`board`], [`screen`]): dashboard partitions and routing
//!
//! [`FamilyTaskService`] wires these together over explicit handles.
//!
//! # Example
//!
//! ```no_run
//! use famtask_core::{FamilyTaskService, MemoryAuth, MemoryPush, ServiceConfig};
//! use famtask_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let service = FamilyTaskService::init(
//!     ServiceConfig::local(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryAuth::new()),
//!     Arc::new(MemoryPush::new("device-token")),
//! )?;
//! # Ok::<(), famtask_core::FamilyTaskError>(())
//! ```

pub mod auth;
pub mod board;
pub mod config;
pub mod documents;
pub mod error;
pub mod feed;
pub mod guard;
pub mod lifecycle;
pub mod logging;
pub mod membership;
pub mod notify;
pub mod profile;
pub mod screen;
pub mod service;

pub use auth::{AuthProvider, AuthUser, FederatedIdentity, MemoryAuth, MIN_PASSWORD_LEN};
pub use board::{first_child, BoardEntry, ChildBoard, ParentBoard};
pub use config::{BackendConfig, ServiceConfig, BACKEND_KEYS, ENV_PREFIX};
pub use error::{ErrorKind, FamilyTaskError, Result};
pub use feed::{
    members_feed, task_feed, ChildSession, FamilyFeed, FeedUpdate, LiveQuery, LoadState,
    MembersFeed, TaskFeed,
};
pub use guard::{InFlightGuard, InFlightToken};
pub use lifecycle::{allowed_transitions, validate_transition, TaskLifecycle, TransitionOutcome};
pub use membership::{CreatedFamily, FamilyMembership};
pub use notify::{
    MemoryPush, Notice, NotificationRegistrar, Permission, PushMessage, PushMessaging,
    Registration, DEFAULT_NOTIFICATION_BODY,
};
pub use profile::ProfileService;
pub use screen::{Screen, SessionView};
pub use service::FamilyTaskService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

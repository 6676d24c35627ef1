//! Service object
//!
//! [`FamilyTaskService`] owns the boundary handles (store, auth, messaging)
//! and hands them to every engine. It is built explicitly with
//! [`FamilyTaskService::init`] and shut down with
//! [`FamilyTaskService::dispose`]; there is no global instance.
//!
//! User-facing flows go through an [`InFlightGuard`] so a double click
//! surfaces as `Busy` instead of a second write.

use crate::auth::{AuthProvider, FederatedIdentity};
use crate::config::ServiceConfig;
use crate::error::{FamilyTaskError, Result};
use crate::feed::{ChildSession, FamilyFeed};
use crate::guard::InFlightGuard;
use crate::lifecycle::{TaskLifecycle, TransitionOutcome};
use crate::membership::{CreatedFamily, FamilyMembership};
use crate::notify::{NotificationRegistrar, PushMessaging, Registration};
use crate::profile::ProfileService;
use chrono::{DateTime, Utc};
use famtask_model::{FamilyId, NewTask, Role, TaskId, UserId, UserProfile};
use famtask_store::DocumentStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Entry point for every family task operation
#[derive(Debug)]
pub struct FamilyTaskService {
    config: ServiceConfig,
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    profiles: ProfileService,
    membership: FamilyMembership,
    lifecycle: TaskLifecycle,
    notifications: NotificationRegistrar,
    guard: InFlightGuard,
    disposed: AtomicBool,
}

impl FamilyTaskService {
    /// Build the service over the given boundaries
    ///
    /// # Errors
    /// - `NotConfigured` if any backend setting is missing or a placeholder
    pub fn init(
        config: ServiceConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        push: Arc<dyn PushMessaging>,
    ) -> Result<Self> {
        config.ensure_configured()?;
        tracing::info!(project = %config.backend.project_id, "family task service starting");

        Ok(Self {
            profiles: ProfileService::new(Arc::clone(&store)),
            membership: FamilyMembership::new(
                Arc::clone(&store),
                config.conflict_retry_limit,
                config.invite_code_attempts,
            ),
            lifecycle: TaskLifecycle::new(Arc::clone(&store), config.conflict_retry_limit),
            notifications: NotificationRegistrar::new(Arc::clone(&store), push),
            guard: InFlightGuard::new(),
            disposed: AtomicBool::new(false),
            config,
            store,
            auth,
        })
    }

    /// Stop accepting calls
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            tracing::info!("family task service disposed");
        }
    }

    /// Whether [`FamilyTaskService::dispose`] was called
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(FamilyTaskError::Unexpected("service disposed".into()))
        } else {
            Ok(())
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Document store handle
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Auth boundary
    #[inline]
    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    /// Profile service
    #[inline]
    #[must_use]
    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    /// Membership engine
    #[inline]
    #[must_use]
    pub fn membership(&self) -> &FamilyMembership {
        &self.membership
    }

    /// Lifecycle engine
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &TaskLifecycle {
        &self.lifecycle
    }

    /// Notification registrar
    #[inline]
    #[must_use]
    pub fn notifications(&self) -> &NotificationRegistrar {
        &self.notifications
    }

    /// Duplicate-submission guard
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    /// Create an account and its profile
    ///
    /// # Errors
    /// - credential errors from the auth boundary
    /// - boundary errors from the store
    pub async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<UserProfile> {
        self.live()?;
        let _busy = self.guard.begin(format!("sign-in:{}", email.trim().to_lowercase()))?;
        let user = self.auth.sign_up(email, password, display_name).await?;
        self.profiles.ensure_profile(&user).await
    }

    /// Sign in and load (or create) the profile
    ///
    /// # Errors
    /// - credential errors from the auth boundary
    /// - boundary errors from the store
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile> {
        self.live()?;
        let _busy = self.guard.begin(format!("sign-in:{}", email.trim().to_lowercase()))?;
        let user = self.auth.sign_in(email, password).await?;
        self.profiles.ensure_profile(&user).await
    }

    /// Sign in through an external provider
    ///
    /// # Errors
    /// - errors from the auth boundary or the store
    pub async fn sign_in_federated(&self, identity: FederatedIdentity) -> Result<UserProfile> {
        self.live()?;
        let _busy = self
            .guard
            .begin(format!("sign-in:{}:{}", identity.provider, identity.subject))?;
        let user = self.auth.sign_in_federated(identity).await?;
        self.profiles.ensure_profile(&user).await
    }

    /// Sign out, dropping this device's push token if one was registered
    ///
    /// # Errors
    /// - `Unexpected` once the service is disposed
    /// - errors from the auth boundary
    pub async fn sign_out(&self, push_token: Option<&str>) -> Result<()> {
        self.live()?;
        if let Some(token) = push_token {
            if let Err(e) = self.notifications.unregister(token).await {
                tracing::warn!(error = %e, "failed to remove push token");
            }
        }
        self.auth.sign_out().await
    }

    /// Pick the user's role once
    ///
    /// # Errors
    /// - `RoleAlreadySet` if a different role is on record
    pub async fn select_role(&self, user: &UserId, role: Role) -> Result<UserProfile> {
        self.live()?;
        let _busy = self.guard.begin(format!("select-role:{user}"))?;
        self.profiles.select_role(user, role).await
    }

    /// Create a family led by `parent`
    ///
    /// # Errors
    /// - `Validation` if the user is not a parent
    /// - `Busy` on a duplicate submission
    pub async fn create_family(&self, parent: &UserProfile) -> Result<CreatedFamily> {
        self.live()?;
        if !parent.is(Role::Parent) {
            return Err(FamilyTaskError::Validation("only parents can create a family".into()));
        }
        self.guard
            .run(
                format!("family-setup:{}", parent.uid),
                self.membership.create_family(&parent.uid),
            )
            .await
    }

    /// Join a family by invite code under the user's role
    ///
    /// # Errors
    /// - `Validation` if the user has not picked a role
    /// - `InvalidInviteCode` if no family answers to the code
    /// - `Busy` on a duplicate submission
    pub async fn join_family(&self, user: &UserProfile, code: &str) -> Result<FamilyId> {
        self.live()?;
        let role = user
            .role
            .ok_or_else(|| FamilyTaskError::Validation("choose a role first".into()))?;
        self.guard
            .run(
                format!("family-setup:{}", user.uid),
                self.membership.join_family(code, &user.uid, role),
            )
            .await
    }

    /// Create a task for the family's child (or `assigned_to`)
    ///
    /// # Errors
    /// - `Validation` if the creator is not a parent
    /// - everything [`TaskLifecycle::create_task`] returns
    pub async fn create_task(
        &self,
        creator: &UserProfile,
        assigned_to: Option<&UserId>,
        draft: NewTask,
    ) -> Result<TaskId> {
        self.live()?;
        if !creator.is(Role::Parent) {
            return Err(FamilyTaskError::Validation("only parents can create tasks".into()));
        }
        self.guard
            .run(
                format!("create-task:{}", creator.uid),
                self.lifecycle.create_task(creator, assigned_to, draft),
            )
            .await
    }

    /// Plan when a task will be done
    ///
    /// # Errors
    /// - everything [`TaskLifecycle::plan`] returns, plus `Busy`
    pub async fn plan_task(&self, task: &TaskId, when: DateTime<Utc>) -> Result<TransitionOutcome> {
        self.live()?;
        self.guard
            .run(format!("task:{task}"), self.lifecycle.plan(task, when))
            .await
    }

    /// Mark a task done
    ///
    /// # Errors
    /// - everything [`TaskLifecycle::complete`] returns, plus `Busy`
    pub async fn complete_task(&self, task: &TaskId) -> Result<TransitionOutcome> {
        self.live()?;
        self.guard
            .run(format!("task:{task}"), self.lifecycle.complete(task))
            .await
    }

    /// Live view of a family
    ///
    /// # Errors
    /// - `Unexpected` once the service is disposed
    pub fn family_feed(&self, family: Option<FamilyId>) -> Result<FamilyFeed> {
        self.live()?;
        Ok(FamilyFeed::open(Arc::clone(&self.store), family))
    }

    /// Live child view that marks new tasks seen
    ///
    /// # Errors
    /// - `NotInFamily` if the child has no family
    /// - `Unexpected` once the service is disposed
    pub fn child_session(&self, child: &UserProfile) -> Result<ChildSession> {
        self.live()?;
        let family = child
            .family_id
            .clone()
            .ok_or_else(|| FamilyTaskError::NotInFamily {
                user_id: child.uid.clone(),
            })?;
        Ok(ChildSession::new(
            child.uid.clone(),
            self.family_feed(Some(family))?,
            self.lifecycle.clone(),
        ))
    }

    /// Permission prompt and token registration for a signed-in user
    ///
    /// # Errors
    /// - `Unexpected` once the service is disposed; every other failure
    ///   degrades into the returned [`Registration`]
    pub async fn initialize_notifications(&self, user: &UserId) -> Result<Registration> {
        self.live()?;
        Ok(self.notifications.initialize(user).await)
    }
}

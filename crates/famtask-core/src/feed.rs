//! Realtime family views
//!
//! - [`LiveQuery`]: one store subscription decoded into domain values
//! - [`FamilyFeed`]: a family's tasks and members with a load state
//! - [`ChildSession`]: a child's feed that marks new tasks seen as they arrive
//!
//! Every snapshot replaces the held collection wholesale. Documents that do
//! not decode are skipped with a warning so one bad record never blanks the
//! whole list.

use crate::board::ChildBoard;
use crate::documents::{self, collections, fields};
use crate::error::Result;
use crate::lifecycle::TaskLifecycle;
use chrono::{DateTime, Utc};
use famtask_model::{FamilyId, Task, UserId, UserProfile};
use famtask_store::{
    Direction, Document, DocumentStore, Query, Snapshot, StoreError, Subscription, SubscriptionId,
};
use std::fmt;
use std::sync::Arc;

type Decoder<T> = fn(&Document) -> std::result::Result<T, StoreError>;

/// A subscription whose snapshots decode into `T`
pub struct LiveQuery<T> {
    subscription: Subscription,
    decode: Decoder<T>,
}

/// Live tasks of one family, newest first
pub type TaskFeed = LiveQuery<Task>;

/// Live profiles of one family's members
pub type MembersFeed = LiveQuery<UserProfile>;

impl<T> LiveQuery<T> {
    fn new(subscription: Subscription, decode: Decoder<T>) -> Self {
        Self {
            subscription,
            decode,
        }
    }

    /// Subscription id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Wait for the next snapshot; `None` once the store side is gone
    pub async fn next(&mut self) -> Option<Vec<T>> {
        let snapshot = self.subscription.next().await?;
        Some(self.decode_snapshot(&snapshot))
    }

    /// Latest snapshot without waiting
    #[must_use]
    pub fn current(&self) -> Vec<T> {
        self.decode_snapshot(&self.subscription.current())
    }

    /// Close the subscription
    pub fn close(self) {
        self.subscription.unsubscribe();
    }

    fn decode_snapshot(&self, snapshot: &Snapshot) -> Vec<T> {
        tracing::debug!(
            subscription = %self.subscription.id(),
            documents = snapshot.len(),
            sequence = snapshot.sequence,
            "snapshot received"
        );
        snapshot
            .documents
            .iter()
            .filter_map(|doc| match (self.decode)(doc) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(id = %doc.id, error = %e, "skipping malformed document");
                    None
                }
            })
            .collect()
    }
}

impl<T> fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery")
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

/// Subscribe to a family's tasks, newest first
///
/// # Errors
/// - boundary errors from the store
pub fn task_feed(store: &dyn DocumentStore, family: &FamilyId) -> Result<TaskFeed> {
    let query = Query::collection(collections::TASKS)
        .where_eq(fields::FAMILY_ID, family.as_str())
        .order_by(fields::CREATED_AT, Direction::Descending);
    Ok(LiveQuery::new(store.subscribe(query)?, documents::decode_task))
}

/// Subscribe to the profiles of a family's members
///
/// # Errors
/// - boundary errors from the store
pub fn members_feed(store: &dyn DocumentStore, family: &FamilyId) -> Result<MembersFeed> {
    let query = Query::collection(collections::USERS).where_eq(fields::FAMILY_ID, family.as_str());
    Ok(LiveQuery::new(store.subscribe(query)?, documents::decode_profile))
}

/// Load state of a [`FamilyFeed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting for the first snapshots
    Loading,
    /// Data reflects the store
    Ready,
    /// Subscribing failed or the store went away
    Failed(String),
}

/// Which collection a [`FamilyFeed::refresh`] updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedUpdate {
    /// Task list replaced
    Tasks,
    /// Member list replaced
    Members,
}

/// Tasks and members of the current family
#[derive(Debug)]
pub struct FamilyFeed {
    store: Arc<dyn DocumentStore>,
    family_id: Option<FamilyId>,
    task_feed: Option<TaskFeed>,
    members_feed: Option<MembersFeed>,
    tasks: Vec<Task>,
    members: Vec<UserProfile>,
    tasks_loaded: bool,
    members_loaded: bool,
    state: LoadState,
}

impl FamilyFeed {
    /// Feed following `family_id`, if any
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>, family_id: Option<FamilyId>) -> Self {
        let mut feed = Self {
            store,
            family_id: None,
            task_feed: None,
            members_feed: None,
            tasks: Vec::new(),
            members: Vec::new(),
            tasks_loaded: false,
            members_loaded: false,
            state: LoadState::Ready,
        };
        feed.switch_family(family_id);
        feed
    }

    /// Follow another family, closing the current subscriptions first
    ///
    /// Switching to the family already followed is a no-op unless the feed
    /// failed, in which case it subscribes again.
    pub fn switch_family(&mut self, family_id: Option<FamilyId>) {
        let failed = matches!(self.state, LoadState::Failed(_));
        if !failed && self.family_id.is_some() && self.family_id == family_id {
            return;
        }
        self.close();
        self.family_id = family_id.clone();

        let Some(family) = family_id else {
            self.state = LoadState::Ready;
            return;
        };

        self.state = LoadState::Loading;
        let opened = task_feed(self.store.as_ref(), &family)
            .and_then(|t| Ok((t, members_feed(self.store.as_ref(), &family)?)));
        match opened {
            Ok((tasks, members)) => {
                tracing::debug!(family = %family, "family feed opened");
                self.task_feed = Some(tasks);
                self.members_feed = Some(members);
            }
            Err(e) => {
                tracing::warn!(family = %family, error = %e, "could not open family feed");
                self.state = LoadState::Failed(e.to_string());
            }
        }
    }

    /// Subscribe again to the family already followed
    pub fn reopen(&mut self) {
        let family_id = self.family_id.take();
        self.switch_family(family_id);
    }

    /// Drop both subscriptions and the held data
    pub fn close(&mut self) {
        if let Some(feed) = self.task_feed.take() {
            feed.close();
        }
        if let Some(feed) = self.members_feed.take() {
            feed.close();
        }
        self.tasks.clear();
        self.members.clear();
        self.tasks_loaded = false;
        self.members_loaded = false;
    }

    /// Wait for the next snapshot on either subscription and apply it
    ///
    /// Returns `None` when there is nothing to wait for: no family, a failed
    /// feed, or a store that went away (which marks the feed failed).
    pub async fn refresh(&mut self) -> Option<FeedUpdate> {
        let (Some(tasks), Some(members)) = (self.task_feed.as_mut(), self.members_feed.as_mut())
        else {
            return None;
        };

        enum Received {
            Tasks(Option<Vec<Task>>),
            Members(Option<Vec<UserProfile>>),
        }
        let received = tokio::select! {
            t = tasks.next() => Received::Tasks(t),
            m = members.next() => Received::Members(m),
        };

        let update = match received {
            Received::Tasks(Some(list)) => {
                self.tasks = list;
                self.tasks_loaded = true;
                FeedUpdate::Tasks
            }
            Received::Members(Some(list)) => {
                self.members = list;
                self.members_loaded = true;
                FeedUpdate::Members
            }
            Received::Tasks(None) | Received::Members(None) => {
                tracing::warn!(family = ?self.family_id, "family feed closed by store");
                self.close();
                self.state = LoadState::Failed("subscription closed".into());
                return None;
            }
        };

        if self.tasks_loaded && self.members_loaded {
            self.state = LoadState::Ready;
        }
        Some(update)
    }

    /// Refresh until the feed is no longer loading
    pub async fn wait_ready(&mut self) -> &LoadState {
        while self.state == LoadState::Loading {
            if self.refresh().await.is_none() {
                break;
            }
        }
        &self.state
    }

    /// Family being followed
    #[inline]
    #[must_use]
    pub fn family_id(&self) -> Option<&FamilyId> {
        self.family_id.as_ref()
    }

    /// Current tasks, newest first
    #[inline]
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Current member profiles
    #[inline]
    #[must_use]
    pub fn members(&self) -> &[UserProfile] {
        &self.members
    }

    /// Load state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &LoadState {
        &self.state
    }
}

impl Drop for FamilyFeed {
    fn drop(&mut self) {
        self.close();
    }
}

/// A child's live view that marks newly visible tasks as seen
#[derive(Debug)]
pub struct ChildSession {
    child: UserId,
    feed: FamilyFeed,
    lifecycle: TaskLifecycle,
    marked: usize,
}

impl ChildSession {
    /// Session for `child` over an open feed
    #[must_use]
    pub fn new(child: UserId, feed: FamilyFeed, lifecycle: TaskLifecycle) -> Self {
        Self {
            child,
            feed,
            lifecycle,
            marked: 0,
        }
    }

    /// Apply the next snapshot; task snapshots trigger mark-seen
    ///
    /// # Errors
    /// - errors from the mark-seen batch
    pub async fn refresh(&mut self) -> Result<Option<FeedUpdate>> {
        let update = self.feed.refresh().await;
        if update == Some(FeedUpdate::Tasks) {
            let written = self.lifecycle.mark_seen(&self.child, self.feed.tasks()).await?;
            self.marked += written;
        }
        Ok(update)
    }

    /// Refresh until the feed is ready, marking tasks seen along the way
    ///
    /// # Errors
    /// - errors from the mark-seen batch
    pub async fn wait_ready(&mut self) -> Result<&LoadState> {
        while *self.feed.state() == LoadState::Loading {
            if self.refresh().await?.is_none() {
                break;
            }
        }
        Ok(self.feed.state())
    }

    /// Tasks this session has marked seen so far
    #[inline]
    #[must_use]
    pub fn marked_seen(&self) -> usize {
        self.marked
    }

    /// Underlying feed
    #[inline]
    #[must_use]
    pub fn feed(&self) -> &FamilyFeed {
        &self.feed
    }

    /// The child's board at `now`
    #[must_use]
    pub fn board(&self, now: DateTime<Utc>) -> ChildBoard {
        ChildBoard::for_child(self.feed.tasks(), &self.child, now)
    }
}

//! Realtime query subscriptions
//!
//! A subscription receives full snapshots of its query's result set. Only the
//! latest snapshot is retained; a slow consumer skips intermediate states and
//! always observes the newest one.

use crate::document::Document;
use crate::timestamp::Timestamp;
use std::fmt;
use tokio::sync::watch;

/// Identifier of an open subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Full result set of a query at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Matching documents in query order
    pub documents: Vec<Document>,
    /// Store-wide commit sequence the snapshot reflects
    pub sequence: u64,
    /// Server time the snapshot was taken
    pub read_time: Timestamp,
}

impl Snapshot {
    /// Whether the result set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

type CancelFn = Box<dyn FnOnce() + Send + Sync>;

/// Handle to an open subscription
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    receiver: watch::Receiver<Snapshot>,
    initial_pending: bool,
    cancel: Option<CancelFn>,
}

impl Subscription {
    /// Wrap a snapshot channel
    ///
    /// `cancel` runs exactly once, on [`Subscription::unsubscribe`] or drop.
    #[must_use]
    pub fn new(
        id: SubscriptionId,
        receiver: watch::Receiver<Snapshot>,
        cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            receiver,
            initial_pending: true,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Latest snapshot without waiting
    #[must_use]
    pub fn current(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot
    ///
    /// The first call yields the snapshot taken at subscribe time. Returns
    /// `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.initial_pending {
            self.initial_pending = false;
            return Some(self.receiver.borrow_and_update().clone());
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Close the subscription
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("open", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

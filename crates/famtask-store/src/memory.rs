//! In-memory document store
//!
//! Backs tests, the demo binary and local development. Writes are serialized
//! behind one lock so batches are atomic, and subscribers are notified while
//! that lock is still held so no subscriber can observe snapshots out of
//! commit order.
//!
//! Fault injection (`set_offline`, `deny`, `fail_next_write`) lets callers
//! exercise their error paths without a real backend.

use crate::batch::WriteBatch;
use crate::document::{Document, DocumentId, Fields, Patch, Precondition, Revision};
use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::store::DocumentStore;
use crate::subscription::{Snapshot, Subscription, SubscriptionId};
use crate::timestamp::{Clock, SystemClock, Timestamp};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

type Collection = BTreeMap<DocumentId, Document>;

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Collection>,
    sequence: u64,
    last_commit: Option<Timestamp>,
}

impl State {
    fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    fn doc(&self, collection: &str, id: &DocumentId) -> Option<&Document> {
        self.collection(collection).and_then(|c| c.get(id))
    }
}

#[derive(Debug)]
struct Subscriber {
    query: Query,
    sender: watch::Sender<Snapshot>,
}

#[derive(Debug, Default)]
struct Faults {
    offline: AtomicBool,
    denied: Mutex<HashSet<String>>,
    next_write: Mutex<Option<StoreError>>,
}

#[derive(Debug)]
struct Inner {
    state: RwLock<State>,
    subscribers: DashMap<SubscriptionId, Subscriber>,
    next_subscription: AtomicU64,
    clock: Arc<dyn Clock>,
    faults: Faults,
    closed: AtomicBool,
}

/// Process-local [`DocumentStore`]
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Store driven by the wall clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store driven by a custom clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                subscribers: DashMap::new(),
                next_subscription: AtomicU64::new(1),
                clock,
                faults: Faults::default(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Make every operation fail as unreachable until switched back
    pub fn set_offline(&self, offline: bool) {
        self.inner.faults.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject every operation on a collection with `PermissionDenied`
    pub fn deny(&self, collection: &str) {
        self.inner.faults.denied.lock().insert(collection.to_string());
    }

    /// Lift a previous [`MemoryStore::deny`]
    pub fn allow(&self, collection: &str) {
        self.inner.faults.denied.lock().remove(collection);
    }

    /// Fail the next write (of any kind) with `error`
    pub fn fail_next_write(&self, error: StoreError) {
        *self.inner.faults.next_write.lock() = Some(error);
    }

    /// Number of open subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Copy of every document in a collection, in key order
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.inner
            .state
            .read()
            .collection(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Store-wide commit counter
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.inner.state.read().sequence
    }

    /// Shut the store down; open subscriptions end and further calls fail
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.subscribers.clear();
        tracing::debug!("memory store closed");
    }

    fn guard(&self, collection: &str) -> StoreResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if self.inner.faults.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        if self.inner.faults.denied.lock().contains(collection) {
            return Err(StoreError::PermissionDenied(collection.to_string()));
        }
        Ok(())
    }

    fn guard_write(&self, collection: &str) -> StoreResult<()> {
        self.guard(collection)?;
        match self.inner.faults.next_write.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn commit_time(&self, state: &mut State) -> Timestamp {
        let now = self.inner.clock.now();
        let ts = match state.last_commit {
            Some(last) if now <= last => last.successor(),
            _ => now,
        };
        state.last_commit = Some(ts);
        ts
    }

    fn snapshot_for(&self, state: &State, query: &Query, read_time: Timestamp) -> Snapshot {
        let documents = state
            .collection(&query.collection)
            .map(|c| query.run(c.values()))
            .unwrap_or_default();
        Snapshot {
            documents,
            sequence: state.sequence,
            read_time,
        }
    }

    /// Push fresh snapshots to subscribers of the touched collections.
    /// Caller holds the state write lock.
    fn notify(&self, state: &State, touched: &HashSet<&str>, read_time: Timestamp) {
        for entry in &self.inner.subscribers {
            if touched.contains(entry.query.collection.as_str()) {
                let snapshot = self.snapshot_for(state, &entry.query, read_time);
                entry.sender.send_replace(snapshot);
            }
        }
    }

    fn write_doc(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: &Patch,
        precondition: &Precondition,
        overwrite: bool,
    ) -> StoreResult<Revision> {
        self.guard_write(collection)?;
        let mut state = self.inner.state.write();

        let current = state.doc(collection, id);
        if current.is_none() && *precondition != Precondition::None {
            return Err(StoreError::not_found(collection, id.as_str()));
        }
        precondition
            .check(current)
            .map_err(|reason| StoreError::precondition(collection, id.as_str(), reason))?;

        let (mut fields, revision) = match current {
            Some(doc) if !overwrite => (doc.fields.clone(), doc.revision.next()),
            Some(doc) => (Fields::new(), doc.revision.next()),
            None => (Fields::new(), Revision::INITIAL),
        };

        let now = self.commit_time(&mut state);
        patch.apply(&mut fields, now);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(
                id.clone(),
                Document {
                    id: id.clone(),
                    revision,
                    fields,
                },
            );
        state.sequence += 1;

        tracing::debug!(collection, id = %id, %revision, "document written");
        self.notify(&state, &HashSet::from([collection]), now);
        Ok(revision)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        self.guard(collection)?;
        Ok(self.inner.state.read().doc(collection, id).cloned())
    }

    async fn set(&self, collection: &str, id: &DocumentId, patch: Patch) -> StoreResult<Revision> {
        self.write_doc(collection, id, &patch, &Precondition::None, true)
    }

    async fn add(&self, collection: &str, patch: Patch) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        self.write_doc(collection, &id, &patch, &Precondition::None, true)?;
        Ok(id)
    }

    async fn update_with(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Patch,
        precondition: Precondition,
    ) -> StoreResult<Revision> {
        self.write_doc(collection, id, &patch, &precondition, false)
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> StoreResult<()> {
        self.guard_write(collection)?;
        let mut state = self.inner.state.write();
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .is_some();
        if removed {
            let now = self.commit_time(&mut state);
            state.sequence += 1;
            self.notify(&state, &HashSet::from([collection]), now);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.guard(&query.collection)?;
        let state = self.inner.state.read();
        Ok(state
            .collection(&query.collection)
            .map(|c| query.run(c.values()))
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        for write in batch.writes() {
            self.guard(&write.collection)?;
        }
        self.guard_write(&batch.writes()[0].collection)?;

        let mut state = self.inner.state.write();

        // Stage every write against a private copy so a failing precondition
        // leaves the stored state untouched.
        let mut staged: BTreeMap<(String, DocumentId), Document> = BTreeMap::new();
        let now = self.commit_time(&mut state);
        for write in batch.writes() {
            let key = (write.collection.clone(), write.id.clone());
            let current = staged
                .get(&key)
                .cloned()
                .or_else(|| state.doc(&write.collection, &write.id).cloned());

            if current.is_none() && write.precondition != Precondition::None {
                return Err(StoreError::not_found(&write.collection, write.id.as_str()));
            }
            write
                .precondition
                .check(current.as_ref())
                .map_err(|reason| {
                    StoreError::precondition(&write.collection, write.id.as_str(), reason)
                })?;

            let mut doc = current.map_or_else(
                || Document {
                    id: write.id.clone(),
                    revision: Revision::INITIAL,
                    fields: Fields::new(),
                },
                |mut d| {
                    d.revision = d.revision.next();
                    d
                },
            );
            write.patch.apply(&mut doc.fields, now);
            staged.insert(key, doc);
        }

        let count = staged.len();
        for ((collection, id), doc) in staged {
            state
                .collections
                .entry(collection)
                .or_default()
                .insert(id, doc);
        }
        state.sequence += 1;

        let touched: HashSet<&str> = batch.writes().iter().map(|w| w.collection.as_str()).collect();
        tracing::debug!(documents = count, "batch committed");
        self.notify(&state, &touched, now);
        Ok(())
    }

    fn subscribe(&self, query: Query) -> StoreResult<Subscription> {
        self.guard(&query.collection)?;
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));

        // Hold the read lock across registration so no commit can slip in
        // between the initial snapshot and the first notification.
        let state = self.inner.state.read();
        let read_time = self.inner.clock.now();
        let initial = self.snapshot_for(&state, &query, read_time);
        let (sender, receiver) = watch::channel(initial);
        self.inner
            .subscribers
            .insert(id, Subscriber { query, sender });
        drop(state);

        tracing::debug!(subscription = %id, "subscription opened");
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(id, receiver, move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.remove(&id);
                tracing::debug!(subscription = %id, "subscription closed");
            }
        }))
    }
}

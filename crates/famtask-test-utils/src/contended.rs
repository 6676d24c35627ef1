//! A store where another client keeps winning guarded writes

use async_trait::async_trait;
use famtask_store::{
    Document, DocumentId, DocumentStore, MemoryStore, Patch, Precondition, Query, Revision,
    StoreResult, Subscription, WriteBatch,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a [`MemoryStore`]; before each guarded update on `collection`, the
/// next queued rival patch lands first on the same document.
///
/// Unguarded writes (`Precondition::None`) and batches pass straight through.
#[derive(Debug)]
pub struct ContendedStore {
    inner: Arc<MemoryStore>,
    collection: String,
    rivals: Mutex<VecDeque<Patch>>,
    landed: AtomicUsize,
}

impl ContendedStore {
    pub fn new(inner: Arc<MemoryStore>, collection: &str) -> Self {
        Self {
            inner,
            collection: collection.to_string(),
            rivals: Mutex::new(VecDeque::new()),
            landed: AtomicUsize::new(0),
        }
    }

    /// Queue a rival write
    pub fn rival(self, patch: Patch) -> Self {
        self.rivals.lock().push_back(patch);
        self
    }

    /// Rival writes applied so far
    pub fn landed(&self) -> usize {
        self.landed.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.rivals.lock().len()
    }
}

#[async_trait]
impl DocumentStore for ContendedStore {
    async fn get(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &DocumentId, patch: Patch) -> StoreResult<Revision> {
        self.inner.set(collection, id, patch).await
    }

    async fn add(&self, collection: &str, patch: Patch) -> StoreResult<DocumentId> {
        self.inner.add(collection, patch).await
    }

    async fn update_with(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Patch,
        precondition: Precondition,
    ) -> StoreResult<Revision> {
        if collection == self.collection && precondition != Precondition::None {
            let rival = self.rivals.lock().pop_front();
            if let Some(rival) = rival {
                self.inner.update(collection, id, rival).await?;
                self.landed.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.inner.update_with(collection, id, patch, precondition).await
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.inner.commit(batch).await
    }

    fn subscribe(&self, query: Query) -> StoreResult<Subscription> {
        self.inner.subscribe(query)
    }
}

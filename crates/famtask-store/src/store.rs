//! The document store boundary

use crate::batch::WriteBatch;
use crate::document::{Document, DocumentId, Patch, Precondition, Revision};
use crate::error::StoreResult;
use crate::query::Query;
use crate::subscription::Subscription;
use async_trait::async_trait;

/// Hosted document database as seen by the rest of the system
///
/// Collections hold JSON documents keyed by [`DocumentId`]. Every write
/// resolves server-timestamp placeholders against the store's own clock and
/// bumps the document's [`Revision`]. Subscribers of matching queries receive
/// a fresh full snapshot after each committed write.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Point read
    async fn get(&self, collection: &str, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Create or overwrite a document with exactly the patch's fields
    async fn set(&self, collection: &str, id: &DocumentId, patch: Patch) -> StoreResult<Revision>;

    /// Create a document under a generated id
    async fn add(&self, collection: &str, patch: Patch) -> StoreResult<DocumentId>;

    /// Patch an existing document
    ///
    /// Fails with `StoreError::NotFound` if the document is missing.
    async fn update(&self, collection: &str, id: &DocumentId, patch: Patch) -> StoreResult<Revision> {
        self.update_with(collection, id, patch, Precondition::Exists).await
    }

    /// Patch a document if `precondition` holds
    ///
    /// A missing document fails with `StoreError::NotFound`; any other
    /// mismatch fails with `StoreError::PreconditionFailed`.
    async fn update_with(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Patch,
        precondition: Precondition,
    ) -> StoreResult<Revision>;

    /// Remove a document; removing a missing document succeeds
    async fn delete(&self, collection: &str, id: &DocumentId) -> StoreResult<()>;

    /// One-shot query
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Apply every write of the batch atomically
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Open a realtime subscription on a query
    fn subscribe(&self, query: Query) -> StoreResult<Subscription>;
}

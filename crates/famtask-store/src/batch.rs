//! Atomic multi-document write batches

use crate::document::{DocumentId, Patch, Precondition};

/// One write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWrite {
    /// Target collection
    pub collection: String,
    /// Target document
    pub id: DocumentId,
    /// Field writes
    pub patch: Patch,
    /// Requirement on the current document
    pub precondition: Precondition,
}

/// Writes that commit all together or not at all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<BatchWrite>,
}

impl WriteBatch {
    /// Empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch an existing document
    pub fn update(&mut self, collection: impl Into<String>, id: DocumentId, patch: Patch) -> &mut Self {
        self.update_with(collection, id, patch, Precondition::Exists)
    }

    /// Patch a document under an explicit precondition
    pub fn update_with(
        &mut self,
        collection: impl Into<String>,
        id: DocumentId,
        patch: Patch,
        precondition: Precondition,
    ) -> &mut Self {
        self.writes.push(BatchWrite {
            collection: collection.into(),
            id,
            patch,
            precondition,
        });
        self
    }

    /// Pending writes
    #[inline]
    #[must_use]
    pub fn writes(&self) -> &[BatchWrite] {
        &self.writes
    }

    /// Number of pending writes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch writes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consume into the pending writes
    #[must_use]
    pub fn into_writes(self) -> Vec<BatchWrite> {
        self.writes
    }
}

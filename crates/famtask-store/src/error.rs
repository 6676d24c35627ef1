//! Error types for the document store boundary

/// Result alias used throughout the store
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures a document store can report
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Target document does not exist
    #[error("document not found: {collection}/{id}")]
    NotFound {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    /// Document already exists where a fresh one was required
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    /// A write precondition did not hold
    #[error("precondition failed on {collection}/{id}: {reason}")]
    PreconditionFailed {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
        /// What did not match
        reason: String,
    },

    /// Access rules rejected the operation
    #[error("permission denied on {0}")]
    PermissionDenied(String),

    /// Backend cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data does not have the expected shape
    #[error("invalid document {collection}/{id}: {reason}")]
    InvalidDocument {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
        /// Decoding failure
        reason: String,
    },

    /// Store has been shut down
    #[error("store closed")]
    Closed,
}

impl StoreError {
    /// Check if error is a precondition conflict another attempt could resolve
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    /// Check if error means the document is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn precondition(collection: &str, id: &str, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

//! Document store boundary for the family task service
//!
//! This crate models the hosted document database the service talks to:
//!
//! - **Documents**: JSON field maps with a per-document [`Revision`]
//! - **Patches**: ordered field writes, including server-timestamp placeholders
//! - **Preconditions**: compare-and-swap guards on revisions or field values
//! - **Batches**: multi-document writes that commit atomically
//! - **Queries**: equality filters with a single sort key and an optional limit
//! - **Subscriptions**: full-snapshot realtime feeds over a query
//!
//! [`MemoryStore`] is the in-process implementation used by tests, the demo
//! binary and local development.

pub mod batch;
pub mod document;
pub mod error;
pub mod memory;
pub mod query;
pub mod store;
pub mod subscription;
pub mod timestamp;

pub use batch::{BatchWrite, WriteBatch};
pub use document::{Document, DocumentId, FieldValue, Fields, Patch, Precondition, Revision};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{compare_values, Direction, Filter, Query};
pub use store::DocumentStore;
pub use subscription::{Snapshot, Subscription, SubscriptionId};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

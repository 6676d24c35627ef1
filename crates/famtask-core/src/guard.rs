//! Duplicate-submission guard
//!
//! A user action (create a task, join a family, ...) keyed by name may only
//! be in flight once. The key is released when the returned token drops, on
//! success and failure alike.

use crate::error::{FamilyTaskError, Result};
use dashmap::DashSet;
use std::future::Future;
use std::sync::Arc;

/// Tracks actions currently in flight
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    active: Arc<DashSet<String>>,
}

/// Proof that an action is in flight; releases it on drop
#[derive(Debug)]
pub struct InFlightToken {
    action: String,
    active: Arc<DashSet<String>>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.active.remove(&self.action);
    }
}

impl InFlightGuard {
    /// Nothing in flight
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `action` in flight
    ///
    /// # Errors
    /// - `Busy` if the action is already in flight
    pub fn begin(&self, action: impl Into<String>) -> Result<InFlightToken> {
        let action = action.into();
        if !self.active.insert(action.clone()) {
            tracing::debug!(action = %action, "duplicate submission rejected");
            return Err(FamilyTaskError::Busy(action));
        }
        Ok(InFlightToken {
            action,
            active: Arc::clone(&self.active),
        })
    }

    /// Whether `action` is in flight
    #[must_use]
    pub fn is_busy(&self, action: &str) -> bool {
        self.active.contains(action)
    }

    /// Run `work` as `action`, rejecting overlapping runs
    ///
    /// # Errors
    /// - `Busy` if the action is already in flight
    /// - whatever `work` returns
    pub async fn run<F, T>(&self, action: impl Into<String>, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _token = self.begin(action)?;
        work.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_busy_until_release() {
        let guard = InFlightGuard::new();
        let token = guard.begin("create-task:mom").unwrap();
        assert!(guard.is_busy("create-task:mom"));
        assert!(matches!(
            guard.begin("create-task:mom"),
            Err(FamilyTaskError::Busy(_))
        ));
        assert!(guard.begin("create-task:dad").is_ok());

        drop(token);
        assert!(!guard.is_busy("create-task:mom"));
    }

    #[tokio::test]
    async fn failure_releases_key() {
        let guard = InFlightGuard::new();
        let result: Result<()> = guard
            .run("join", async { Err(FamilyTaskError::Unexpected("boom".into())) })
            .await;
        assert!(result.is_err());
        assert!(!guard.is_busy("join"));
    }
}

//! Error types for the family task service
//!
//! Every failure a caller can see is a [`FamilyTaskError`]. Each one maps to
//! a coarse [`ErrorKind`] that front ends branch on, and carries a short
//! [`user_message`](FamilyTaskError::user_message) suitable for a toast.
//!
//! Nothing here is retried automatically.

use famtask_model::{FamilyId, ModelError, Role, TaskStatus, UserId};
use famtask_store::StoreError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FamilyTaskError>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum FamilyTaskError {
    /// Unknown account, wrong password or malformed e-mail
    #[error("invalid credential")]
    InvalidCredential,

    /// Sign-up with an e-mail that already has an account
    #[error("e-mail already registered: {email}")]
    AlreadyRegistered {
        /// The e-mail in use
        email: String,
    },

    /// Password below the minimum length
    #[error("weak credential: at least {min_len} characters required")]
    WeakCredential {
        /// Minimum accepted length
        min_len: usize,
    },

    /// No family answers to the code
    #[error("invalid invite code: {code}")]
    InvalidInviteCode {
        /// Normalized input
        code: String,
    },

    /// Store access rules rejected the call
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend could not be reached
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Backend settings are missing or placeholders
    #[error("backend not configured, missing: {}", missing.join(", "))]
    NotConfigured {
        /// Names of the missing settings
        missing: Vec<String>,
    },

    /// Configuration could not be read
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected before reaching the store
    #[error("validation failed: {0}")]
    Validation(String),

    /// Task creation needs a child to assign to
    #[error("family {family_id} has no child member")]
    NoChildInFamily {
        /// Family without children
        family_id: FamilyId,
    },

    /// Operation needs the user to belong to a family
    #[error("user {user_id} does not belong to a family")]
    NotInFamily {
        /// User without a family
        user_id: UserId,
    },

    /// Role is chosen once
    #[error("role already set to {current}")]
    RoleAlreadySet {
        /// Role on record
        current: Role,
    },

    /// Lifecycle table forbids the move
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current stored status
        from: TaskStatus,
        /// Requested status
        to: TaskStatus,
    },

    /// The same action is still running
    #[error("already in progress: {0}")]
    Busy(String),

    /// Compare-and-swap kept losing to other writers
    #[error("conflict on {target} persisted after {attempts} attempts")]
    Conflict {
        /// Contended document
        target: String,
        /// Attempts made
        attempts: u32,
    },

    /// Boundary error from the document store
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Domain decoding or validation error
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Anything else
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Coarse classification of [`FamilyTaskError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad sign-in
    InvalidCredential,
    /// E-mail taken
    AlreadyRegistered,
    /// Password too short
    WeakCredential,
    /// Unknown invite code
    InvalidInviteCode,
    /// Access denied
    PermissionDenied,
    /// Offline or backend down
    NetworkUnreachable,
    /// Backend settings missing
    NotConfigured,
    /// Catch-all
    Unexpected,
    /// Rejected input
    Validation,
    /// Family has no child
    NoChildInFamily,
    /// User has no family
    NotInFamily,
    /// Role cannot change
    RoleAlreadySet,
    /// Forbidden lifecycle move
    IllegalTransition,
    /// Duplicate submission
    Busy,
    /// Contention not resolved
    Conflict,
}

impl FamilyTaskError {
    /// Classify the error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredential => ErrorKind::InvalidCredential,
            Self::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            Self::WeakCredential { .. } => ErrorKind::WeakCredential,
            Self::InvalidInviteCode { .. } => ErrorKind::InvalidInviteCode,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            Self::NotConfigured { .. } | Self::Config(_) => ErrorKind::NotConfigured,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NoChildInFamily { .. } => ErrorKind::NoChildInFamily,
            Self::NotInFamily { .. } => ErrorKind::NotInFamily,
            Self::RoleAlreadySet { .. } => ErrorKind::RoleAlreadySet,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::Busy(_) => ErrorKind::Busy,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Store(e) => match e {
                StoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
                StoreError::Unavailable(_) | StoreError::Closed => ErrorKind::NetworkUnreachable,
                StoreError::PreconditionFailed { .. } => ErrorKind::Conflict,
                _ => ErrorKind::Unexpected,
            },
            Self::Model(e) => match e {
                ModelError::InvalidInviteCode { .. } => ErrorKind::InvalidInviteCode,
                ModelError::EmptyTitle => ErrorKind::Validation,
                _ => ErrorKind::Unexpected,
            },
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Short text to show the user
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidCredential => "Incorrect email or password. Please try again.",
            ErrorKind::AlreadyRegistered => {
                "This email is already registered. Please sign in instead."
            }
            ErrorKind::WeakCredential => "Password should be at least 6 characters.",
            ErrorKind::InvalidInviteCode => "Invalid invite code. Please check and try again.",
            ErrorKind::PermissionDenied => "You don't have permission to do that.",
            ErrorKind::NetworkUnreachable => "Can't reach the server. Check your connection.",
            ErrorKind::NotConfigured => "The app is not configured yet.",
            ErrorKind::Validation => "Please fill in all required fields.",
            ErrorKind::NoChildInFamily => "No child in the family yet. Share your invite code first.",
            ErrorKind::NotInFamily => "Join or create a family first.",
            ErrorKind::RoleAlreadySet => "Your role has already been chosen.",
            ErrorKind::IllegalTransition => "That task can no longer be changed.",
            ErrorKind::Busy => "Please wait, still working on it.",
            ErrorKind::Conflict => "Someone else changed this at the same time. Please try again.",
            ErrorKind::Unexpected => "An error occurred. Please try again.",
        }
    }

    /// Check if the service cannot run at all
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::NotConfigured
    }

    /// Check if the error came from losing a compare-and-swap
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_classify_by_cause() {
        let offline: FamilyTaskError = StoreError::Unavailable("offline".into()).into();
        assert_eq!(offline.kind(), ErrorKind::NetworkUnreachable);

        let denied: FamilyTaskError = StoreError::PermissionDenied("tasks".into()).into();
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

        let missing: FamilyTaskError = StoreError::NotFound {
            collection: "tasks".into(),
            id: "t1".into(),
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn model_errors_classify() {
        let e: FamilyTaskError = ModelError::EmptyTitle.into();
        assert_eq!(e.kind(), ErrorKind::Validation);
        let e: FamilyTaskError = ModelError::InvalidInviteCode { input: "X".into() }.into();
        assert_eq!(e.kind(), ErrorKind::InvalidInviteCode);
    }

    #[test]
    fn only_not_configured_is_fatal() {
        assert!(FamilyTaskError::NotConfigured { missing: vec!["api_key".into()] }.is_fatal());
        assert!(!FamilyTaskError::InvalidCredential.is_fatal());
        assert!(!FamilyTaskError::Busy("create-task".into()).is_fatal());
    }

    #[test]
    fn not_configured_lists_missing_keys() {
        let e = FamilyTaskError::NotConfigured {
            missing: vec!["api_key".into(), "project_id".into()],
        };
        assert_eq!(e.to_string(), "backend not configured, missing: api_key, project_id");
        assert_eq!(e.user_message(), "The app is not configured yet.");
    }
}

//! Error types for the domain model

/// Errors raised while validating or decoding domain values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Invite code does not have the expected shape
    #[error("invalid invite code: {input:?}")]
    InvalidInviteCode {
        /// The normalized input that was rejected
        input: String,
    },

    /// Task title is empty after trimming
    #[error("task title must not be empty")]
    EmptyTitle,

    /// Stored status string is not recognised
    #[error("unknown task status: {0}")]
    UnknownStatus(String),

    /// Stored priority string is not recognised
    #[error("unknown task priority: {0}")]
    UnknownPriority(String),

    /// Stored role string is not recognised
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

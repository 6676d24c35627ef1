//! famtask model - domain types shared by every famtask crate
//!
//! Defines:
//! - Opaque identifiers for users, families and tasks
//! - User profiles and family roles
//! - Families and their invite codes
//! - Tasks, priorities, stored statuses and the derived display status
//!
//! # Example
//!
//! ```rust
//! use famtask_model::{NewTask, TaskPriority};
//!
//! let draft = NewTask::new("  Clean room ", TaskPriority::Green)
//!     .validated()
//!     .unwrap();
//! assert_eq!(draft.title, "Clean room");
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod family;
pub mod ids;
pub mod invite;
pub mod profile;
pub mod task;

pub use error::ModelError;
pub use family::Family;
pub use ids::{FamilyId, TaskId, UserId};
pub use invite::{InviteCode, INVITE_CODE_ALPHABET, INVITE_CODE_LEN};
pub use profile::{Role, UserProfile};
pub use task::{DisplayStatus, NewTask, Task, TaskPriority, TaskStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Families

use crate::ids::{FamilyId, UserId};
use crate::invite::InviteCode;
use crate::profile::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A group of parents and children sharing one task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    /// Store-assigned id
    pub id: FamilyId,
    /// Parent members in join order
    pub parent_ids: Vec<UserId>,
    /// Child members in join order
    pub child_ids: Vec<UserId>,
    /// Code other users join with
    pub invite_code: InviteCode,
    /// Server time of creation
    pub created_at: Option<DateTime<Utc>>,
}

impl Family {
    /// Member list for a role
    #[inline]
    #[must_use]
    pub fn members(&self, role: Role) -> &[UserId] {
        match role {
            Role::Parent => &self.parent_ids,
            Role::Child => &self.child_ids,
        }
    }

    /// Role under which the user is a member, if any
    #[must_use]
    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        if self.parent_ids.contains(user) {
            Some(Role::Parent)
        } else if self.child_ids.contains(user) {
            Some(Role::Child)
        } else {
            None
        }
    }

    /// Whether the user is a member under any role
    #[inline]
    #[must_use]
    pub fn contains(&self, user: &UserId) -> bool {
        self.role_of(user).is_some()
    }

    /// Whether at least one child has joined
    #[inline]
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }
}

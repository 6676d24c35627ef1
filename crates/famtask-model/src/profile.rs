//! User profiles and family roles

use crate::error::ModelError;
use crate::ids::{FamilyId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fallback display name when the identity carries neither name nor e-mail
pub const DEFAULT_DISPLAY_NAME: &str = "New User";

/// Role a user plays inside a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates tasks and invites members
    Parent,
    /// Plans and completes assigned tasks
    Child,
}

impl Role {
    /// Stored representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Child => "child",
        }
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(Role::Parent),
            "child" => Ok(Role::Child),
            other => Err(ModelError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user record of role and family membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Owning identity
    pub uid: UserId,
    /// E-mail reported by the identity provider
    pub email: Option<String>,
    /// Name shown to other family members
    pub display_name: Option<String>,
    /// Unset until the user picks a role
    pub role: Option<Role>,
    /// Unset until the user creates or joins a family
    pub family_id: Option<FamilyId>,
}

impl UserProfile {
    /// Fresh profile for a first sign-in
    ///
    /// The display name falls back to the local part of the e-mail, then to
    /// [`DEFAULT_DISPLAY_NAME`].
    #[must_use]
    pub fn for_identity(
        uid: UserId,
        email: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

        Self {
            uid,
            email,
            display_name: Some(display_name),
            role: None,
            family_id: None,
        }
    }

    /// Name to show, or `fallback` when none is stored
    #[inline]
    #[must_use]
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(fallback)
    }

    /// Whether the user holds the given role
    #[inline]
    #[must_use]
    pub fn is(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_identity_name() {
        let p = UserProfile::for_identity(
            UserId::new("u1"),
            Some("kim@example.com".into()),
            Some("Kim".into()),
        );
        assert_eq!(p.display_name.as_deref(), Some("Kim"));
        assert!(p.role.is_none());
        assert!(p.family_id.is_none());
    }

    #[test]
    fn display_name_falls_back_to_email_then_default() {
        let from_mail =
            UserProfile::for_identity(UserId::new("u1"), Some("kim@example.com".into()), None);
        assert_eq!(from_mail.display_name.as_deref(), Some("kim"));

        let bare = UserProfile::for_identity(UserId::new("u2"), None, Some("  ".into()));
        assert_eq!(bare.display_name.as_deref(), Some(DEFAULT_DISPLAY_NAME));
    }

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("child".parse::<Role>().unwrap(), Role::Child);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::Parent.to_string(), "parent");
    }
}

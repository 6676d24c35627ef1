//! User profiles
//!
//! A profile is created the first time an identity signs in and is then only
//! changed by explicit user actions: picking a role once, and creating or
//! joining a family (see `membership`).

use crate::auth::AuthUser;
use crate::documents::{self, collections, fields};
use crate::error::{FamilyTaskError, Result};
use famtask_model::{Role, UserId, UserProfile};
use famtask_store::{DocumentId, DocumentStore, Patch};
use std::sync::Arc;

/// Reads and writes `users/{uid}`
#[derive(Debug, Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    /// Service over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Point read
    ///
    /// # Errors
    /// - boundary errors from the store, or a malformed profile document
    pub async fn profile(&self, uid: &UserId) -> Result<Option<UserProfile>> {
        let doc = self
            .store
            .get(collections::USERS, &DocumentId::new(uid.as_str()))
            .await?;
        Ok(doc.as_ref().map(documents::decode_profile).transpose()?)
    }

    /// Profile of a signed-in identity, created on first sight
    ///
    /// # Errors
    /// - boundary errors from the store, or a malformed profile document
    pub async fn ensure_profile(&self, identity: &AuthUser) -> Result<UserProfile> {
        if let Some(existing) = self.profile(&identity.uid).await? {
            return Ok(existing);
        }
        let profile = UserProfile::for_identity(
            identity.uid.clone(),
            identity.email.clone(),
            identity.display_name.clone(),
        );
        self.store
            .set(
                collections::USERS,
                &DocumentId::new(identity.uid.as_str()),
                documents::profile_patch(&profile),
            )
            .await?;
        tracing::info!(user = %profile.uid, name = profile.name_or(""), "profile created");
        Ok(profile)
    }

    /// Pick the user's role
    ///
    /// Picking the role already on record is a no-op.
    ///
    /// # Errors
    /// - `Unexpected` if the profile does not exist
    /// - `RoleAlreadySet` if a different role is on record
    /// - boundary errors from the store
    pub async fn select_role(&self, uid: &UserId, role: Role) -> Result<UserProfile> {
        let mut profile = self
            .profile(uid)
            .await?
            .ok_or_else(|| FamilyTaskError::Unexpected(format!("no profile for {uid}")))?;

        match profile.role {
            Some(current) if current == role => {
                tracing::debug!(user = %uid, role = %role, "role unchanged");
                return Ok(profile);
            }
            Some(current) => return Err(FamilyTaskError::RoleAlreadySet { current }),
            None => {}
        }

        self.store
            .update(
                collections::USERS,
                &DocumentId::new(uid.as_str()),
                Patch::new().set(fields::ROLE, role.as_str()),
            )
            .await?;
        tracing::info!(user = %uid, role = %role, "role selected");
        profile.role = Some(role);
        Ok(profile)
    }
}

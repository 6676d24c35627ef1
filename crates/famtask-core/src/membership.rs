//! Family membership engine
//!
//! Families are created by a parent and grow by invite-code joins. Member
//! lists only ever gain ids. A join appends with a compare-and-swap on the
//! family document's revision, so concurrent joins never overwrite each
//! other.

use crate::documents::{self, collections, fields};
use crate::error::{FamilyTaskError, Result};
use famtask_model::{Family, FamilyId, InviteCode, Role, UserId};
use famtask_store::{Document, DocumentId, DocumentStore, Patch, Precondition, Query};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Result of [`FamilyMembership::create_family`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFamily {
    /// New family id
    pub family_id: FamilyId,
    /// Code other members join with
    pub invite_code: InviteCode,
}

/// Creates families and joins users to them
#[derive(Debug, Clone)]
pub struct FamilyMembership {
    store: Arc<dyn DocumentStore>,
    retry_limit: u32,
    code_attempts: u32,
    codes: Arc<Mutex<StdRng>>,
}

impl FamilyMembership {
    /// Engine over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, retry_limit: u32, code_attempts: u32) -> Self {
        Self {
            store,
            retry_limit,
            code_attempts: code_attempts.max(1),
            codes: Arc::new(Mutex::new(StdRng::from_rng(&mut rand::rng()))),
        }
    }

    /// Draw invite codes from `rng` instead of a freshly seeded source
    #[must_use]
    pub fn with_code_source(mut self, rng: StdRng) -> Self {
        self.codes = Arc::new(Mutex::new(rng));
        self
    }

    fn next_code(&self) -> InviteCode {
        InviteCode::generate(&mut *self.codes.lock())
    }

    /// Create a family with `parent` as its only member
    ///
    /// # Errors
    /// - `Conflict` if no unused invite code was found
    /// - boundary errors from the store
    pub async fn create_family(&self, parent: &UserId) -> Result<CreatedFamily> {
        let invite_code = self.unused_code().await?;
        let id = self
            .store
            .add(
                collections::FAMILIES,
                documents::new_family_patch(parent, &invite_code),
            )
            .await?;
        let family_id = FamilyId::new(id.as_str());

        self.assign_profile(parent, &family_id).await?;
        tracing::info!(family = %family_id, parent = %parent, code = %invite_code, "family created");
        Ok(CreatedFamily {
            family_id,
            invite_code,
        })
    }

    async fn unused_code(&self) -> Result<InviteCode> {
        for attempt in 1..=self.code_attempts {
            let code = self.next_code();
            if self.find_by_code(&code).await?.is_none() {
                return Ok(code);
            }
            tracing::debug!(attempt, code = %code, "invite code collision, regenerating");
        }
        Err(FamilyTaskError::Conflict {
            target: format!("{}/<invite-code>", collections::FAMILIES),
            attempts: self.code_attempts,
        })
    }

    async fn find_by_code(&self, code: &InviteCode) -> Result<Option<Document>> {
        let query = Query::collection(collections::FAMILIES)
            .where_eq(fields::INVITE_CODE, code.as_str())
            .limit(1);
        Ok(self.store.query(&query).await?.into_iter().next())
    }

    /// Join the family answering to `code` under `role`
    ///
    /// Input is trimmed and upper-cased first. Joining a family the user is
    /// already a member of succeeds without touching the family and still
    /// points the profile at it.
    ///
    /// # Errors
    /// - `InvalidInviteCode` if no family answers to the code
    /// - `Conflict` if concurrent joins kept winning the compare-and-swap
    /// - boundary errors from the store
    pub async fn join_family(&self, code: &str, user: &UserId, role: Role) -> Result<FamilyId> {
        let normalized = InviteCode::normalize(code);
        let invalid = || FamilyTaskError::InvalidInviteCode {
            code: normalized.clone(),
        };
        let code = InviteCode::parse(&normalized).map_err(|_| invalid())?;
        let mut doc = self.find_by_code(&code).await?.ok_or_else(invalid)?;
        let family_id = FamilyId::new(doc.id.as_str());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let family = documents::decode_family(&doc)?;
            if family.members(role).contains(user) {
                tracing::debug!(family = %family_id, user = %user, "already a member");
                break;
            }

            let mut members = family.members(role).to_vec();
            members.push(user.clone());
            let result = self
                .store
                .update_with(
                    collections::FAMILIES,
                    &doc.id,
                    documents::members_patch(role, &members),
                    Precondition::Revision(doc.revision),
                )
                .await;

            match result {
                Ok(_) => {
                    tracing::info!(family = %family_id, user = %user, role = %role, "joined family");
                    break;
                }
                Err(e) if e.is_conflict() && attempt <= self.retry_limit => {
                    tracing::debug!(family = %family_id, attempt, "family changed underneath, re-reading");
                    doc = self
                        .store
                        .get(collections::FAMILIES, &doc.id)
                        .await?
                        .ok_or_else(invalid)?;
                }
                Err(e) if e.is_conflict() => {
                    return Err(FamilyTaskError::Conflict {
                        target: format!("{}/{family_id}", collections::FAMILIES),
                        attempts: attempt,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.assign_profile(user, &family_id).await?;
        Ok(family_id)
    }

    async fn assign_profile(&self, user: &UserId, family_id: &FamilyId) -> Result<()> {
        let profile_id = DocumentId::new(user.as_str());
        if let Some(existing) = self.store.get(collections::USERS, &profile_id).await? {
            let current = existing.get(fields::FAMILY_ID).and_then(|v| v.as_str());
            if current == Some(family_id.as_str()) {
                return Ok(());
            }
            if let Some(previous) = current {
                tracing::warn!(user = %user, previous, next = %family_id, "user moves to another family");
            }
        }
        self.store
            .update_with(
                collections::USERS,
                &profile_id,
                Patch::new().set(fields::FAMILY_ID, family_id.as_str()),
                Precondition::None,
            )
            .await?;
        Ok(())
    }

    /// Point read of a family
    ///
    /// # Errors
    /// - boundary errors from the store, or a malformed family document
    pub async fn family(&self, family_id: &FamilyId) -> Result<Option<Family>> {
        let doc = self
            .store
            .get(collections::FAMILIES, &DocumentId::new(family_id.as_str()))
            .await?;
        Ok(doc.as_ref().map(documents::decode_family).transpose()?)
    }

    /// Invite code of a family, if the family exists
    ///
    /// # Errors
    /// - boundary errors from the store, or a malformed family document
    pub async fn invite_code_of(&self, family_id: &FamilyId) -> Result<Option<InviteCode>> {
        Ok(self.family(family_id).await?.map(|f| f.invite_code))
    }
}

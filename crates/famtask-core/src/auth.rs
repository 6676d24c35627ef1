//! Authentication boundary
//!
//! The service only needs a stable uid per identity, optional e-mail and
//! display name, and a way to watch the session change. [`MemoryAuth`] keeps
//! accounts in process with salted SHA-256 password hashes.

use crate::error::{FamilyTaskError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use famtask_model::UserId;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 6;

/// A signed-in identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Stable identity id, also the profile key
    pub uid: UserId,
    /// E-mail, if the provider shares it
    pub email: Option<String>,
    /// Display name, if the provider shares it
    pub display_name: Option<String>,
}

/// Identity asserted by an external provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    /// Provider name, e.g. `google`
    pub provider: String,
    /// Provider-side subject id
    pub subject: String,
    /// E-mail shared by the provider
    pub email: Option<String>,
    /// Name shared by the provider
    pub display_name: Option<String>,
}

/// Sign-up, sign-in and session tracking
#[async_trait]
pub trait AuthProvider: Send + Sync + std::fmt::Debug {
    /// Create an e-mail/password account and sign it in
    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<AuthUser>;

    /// Sign in with e-mail and password
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// Sign in with an identity from an external provider
    async fn sign_in_federated(&self, identity: FederatedIdentity) -> Result<AuthUser>;

    /// End the session
    async fn sign_out(&self) -> Result<()>;

    /// Identity of the current session
    fn current_user(&self) -> Option<AuthUser>;

    /// Session changes, starting with the current state
    fn watch_session(&self) -> watch::Receiver<Option<AuthUser>>;
}

#[derive(Debug)]
struct Account {
    user: AuthUser,
    salt: [u8; 16],
    hash: String,
}

fn hash_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn fresh_uid() -> UserId {
    let mut bytes = [0u8; 14];
    rand::rng().fill(&mut bytes[..]);
    UserId::new(hex::encode(bytes))
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// In-process [`AuthProvider`]
#[derive(Debug)]
pub struct MemoryAuth {
    accounts: DashMap<String, Account>,
    federated: DashMap<String, AuthUser>,
    session: watch::Sender<Option<AuthUser>>,
    offline: AtomicBool,
}

impl MemoryAuth {
    /// No accounts, signed out
    #[must_use]
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: DashMap::new(),
            federated: DashMap::new(),
            session,
            offline: AtomicBool::new(false),
        }
    }

    /// Make every call fail as unreachable until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of e-mail accounts
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(FamilyTaskError::NetworkUnreachable("auth backend offline".into()))
        } else {
            Ok(())
        }
    }

    fn start_session(&self, user: AuthUser) -> AuthUser {
        self.session.send_replace(Some(user.clone()));
        tracing::info!(user = %user.uid, "signed in");
        user
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_up(&self, email: &str, password: &str, display_name: Option<&str>) -> Result<AuthUser> {
        self.online()?;
        let key = email.trim().to_lowercase();
        if !is_valid_email(&key) {
            return Err(FamilyTaskError::InvalidCredential);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FamilyTaskError::WeakCredential {
                min_len: MIN_PASSWORD_LEN,
            });
        }

        let user = match self.accounts.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(FamilyTaskError::AlreadyRegistered { email: key })
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut salt = [0u8; 16];
                rand::rng().fill(&mut salt[..]);
                let user = AuthUser {
                    uid: fresh_uid(),
                    email: Some(key.clone()),
                    display_name: display_name
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                };
                slot.insert(Account {
                    user: user.clone(),
                    salt,
                    hash: hash_password(&salt, password),
                });
                user
            }
        };
        tracing::info!(user = %user.uid, "account created");
        Ok(self.start_session(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.online()?;
        let key = email.trim().to_lowercase();
        let user = {
            let account = self
                .accounts
                .get(&key)
                .ok_or(FamilyTaskError::InvalidCredential)?;
            if hash_password(&account.salt, password) != account.hash {
                tracing::debug!(email = %key, "password mismatch");
                return Err(FamilyTaskError::InvalidCredential);
            }
            account.user.clone()
        };
        Ok(self.start_session(user))
    }

    async fn sign_in_federated(&self, identity: FederatedIdentity) -> Result<AuthUser> {
        self.online()?;
        let key = format!("{}:{}", identity.provider, identity.subject);
        let user = self
            .federated
            .entry(key)
            .or_insert_with(|| AuthUser {
                uid: fresh_uid(),
                email: identity.email.clone(),
                display_name: identity.display_name.clone(),
            })
            .clone();
        Ok(self.start_session(user))
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(user) = self.session.send_replace(None) {
            tracing::info!(user = %user.uid, "signed out");
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session.borrow().clone()
    }

    fn watch_session(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }
}

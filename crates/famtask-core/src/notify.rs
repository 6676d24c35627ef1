//! Push notification registration
//!
//! On sign-in the registrar asks the messaging backend for permission (only
//! when the user has not decided yet), fetches a registration token and
//! stores it under `fcmTokens/{token}`. Storing the token is best effort.
//! Foreground messages are relayed as [`Notice`]s.
//!
//! Server-side dispatch is not part of this crate.

use crate::documents::{collections, fields};
use crate::error::Result;
use async_trait::async_trait;
use famtask_model::UserId;
use famtask_store::{DocumentId, DocumentStore, Patch};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Body shown when a message carries none
pub const DEFAULT_NOTIFICATION_BODY: &str = "You have a new notification";

/// Notification permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// User has not been asked
    #[default]
    Default,
    /// Notifications allowed
    Granted,
    /// Notifications refused
    Denied,
}

/// A message received while the app is in the foreground
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PushMessage {
    /// Notification title
    pub title: Option<String>,
    /// Notification body
    pub body: Option<String>,
}

/// What the user gets to see for a [`PushMessage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Title, possibly empty
    pub title: String,
    /// Body, never empty
    pub body: String,
}

impl From<PushMessage> for Notice {
    fn from(message: PushMessage) -> Self {
        Self {
            title: message.title.unwrap_or_default(),
            body: message
                .body
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_BODY.to_string()),
        }
    }
}

/// Managed messaging service as seen by the client
#[async_trait]
pub trait PushMessaging: Send + Sync + std::fmt::Debug {
    /// Whether this environment can receive push messages at all
    fn is_supported(&self) -> bool;

    /// Current permission
    fn permission(&self) -> Permission;

    /// Prompt the user; returns the decision
    async fn request_permission(&self) -> Permission;

    /// Registration token of this device
    async fn registration_token(&self) -> Result<Option<String>>;

    /// Messages received while in the foreground
    fn foreground_messages(&self) -> BoxStream<'static, PushMessage>;
}

/// Outcome of [`NotificationRegistrar::initialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Environment cannot receive push messages
    Unsupported,
    /// User refused
    Denied,
    /// Permission granted but no token was issued
    NoToken,
    /// Token issued (and stored, unless storing failed)
    Registered {
        /// Device token
        token: String,
    },
}

/// Registers devices for push delivery
#[derive(Debug, Clone)]
pub struct NotificationRegistrar {
    store: Arc<dyn DocumentStore>,
    push: Arc<dyn PushMessaging>,
}

impl NotificationRegistrar {
    /// Registrar over the given boundaries
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, push: Arc<dyn PushMessaging>) -> Self {
        Self { store, push }
    }

    /// Run the permission and token flow for a signed-in user
    ///
    /// Failures after permission is granted are logged and degrade to
    /// [`Registration::NoToken`] or an unstored token; they never fail the call.
    pub async fn initialize(&self, user: &UserId) -> Registration {
        if !self.push.is_supported() {
            tracing::debug!(user = %user, "push messaging unsupported");
            return Registration::Unsupported;
        }

        let permission = match self.push.permission() {
            Permission::Default => self.push.request_permission().await,
            decided => decided,
        };
        if permission != Permission::Granted {
            tracing::debug!(user = %user, ?permission, "notifications not permitted");
            return Registration::Denied;
        }

        let token = match self.push.registration_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return Registration::NoToken,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "could not obtain push token");
                return Registration::NoToken;
            }
        };

        match self.store_token(user, &token).await {
            Ok(()) => tracing::info!(user = %user, "push token registered"),
            Err(e) => tracing::warn!(user = %user, error = %e, "failed to store push token"),
        }
        Registration::Registered { token }
    }

    /// Write `fcmTokens/{token}`
    ///
    /// # Errors
    /// - boundary errors from the store
    pub async fn store_token(&self, user: &UserId, token: &str) -> Result<()> {
        let patch = Patch::new()
            .set(fields::USER_ID, user.as_str())
            .set(fields::TOKEN, token)
            .server_timestamp(fields::CREATED_AT)
            .server_timestamp(fields::LAST_USED);
        self.store
            .set(collections::FCM_TOKENS, &DocumentId::new(token), patch)
            .await?;
        Ok(())
    }

    /// Forget a device token (on sign-out)
    ///
    /// # Errors
    /// - boundary errors from the store
    pub async fn unregister(&self, token: &str) -> Result<()> {
        self.store
            .delete(collections::FCM_TOKENS, &DocumentId::new(token))
            .await?;
        tracing::info!("push token removed");
        Ok(())
    }

    /// Foreground messages as user-facing notices
    ///
    /// Empty unless permission is granted.
    pub fn notices(&self) -> BoxStream<'static, Notice> {
        if self.push.is_supported() && self.push.permission() == Permission::Granted {
            self.push.foreground_messages().map(Notice::from).boxed()
        } else {
            stream::empty().boxed()
        }
    }
}

/// Scriptable in-process [`PushMessaging`]
#[derive(Debug)]
pub struct MemoryPush {
    supported: bool,
    permission: Mutex<Permission>,
    answer: Permission,
    token: Option<String>,
    prompts: AtomicUsize,
    messages: broadcast::Sender<PushMessage>,
}

impl MemoryPush {
    /// Supported, undecided, grants when asked and issues `token`
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let (messages, _) = broadcast::channel(64);
        Self {
            supported: true,
            permission: Mutex::new(Permission::Default),
            answer: Permission::Granted,
            token: Some(token.into()),
            prompts: AtomicUsize::new(0),
            messages,
        }
    }

    /// Environment without push support
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new("")
        }
    }

    /// With an already decided permission
    #[must_use]
    pub fn with_permission(self, permission: Permission) -> Self {
        *self.permission.lock() = permission;
        self
    }

    /// With the decision the user gives when prompted
    #[must_use]
    pub fn answering(mut self, answer: Permission) -> Self {
        self.answer = answer;
        self
    }

    /// With no token issued
    #[must_use]
    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    /// How many times the user was prompted
    #[must_use]
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Deliver a foreground message; returns how many listeners got it
    pub fn deliver(&self, message: PushMessage) -> usize {
        self.messages.send(message).unwrap_or(0)
    }
}

#[async_trait]
impl PushMessaging for MemoryPush {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn request_permission(&self) -> Permission {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let mut current = self.permission.lock();
        *current = self.answer;
        *current
    }

    async fn registration_token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }

    fn foreground_messages(&self) -> BoxStream<'static, PushMessage> {
        let rx = self.messages.subscribe();
        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "foreground listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

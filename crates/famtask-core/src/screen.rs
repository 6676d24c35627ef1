//! Top-level screen routing

use famtask_model::{FamilyId, Role, UserProfile};

/// What the client knows about the session right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionView<'a> {
    /// Auth state or profile still loading
    Loading,
    /// Nobody signed in
    SignedOut,
    /// Signed in; the profile may not have loaded
    SignedIn(Option<&'a UserProfile>),
}

/// Screen to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Backend settings missing
    NotConfigured,
    /// Waiting on auth or profile
    Loading,
    /// Sign-in / sign-up
    Welcome,
    /// Pick parent or child
    RoleSelection,
    /// Create or join a family
    FamilySetup,
    /// Parent dashboard of a family
    ParentDashboard(FamilyId),
    /// Child dashboard of a family
    ChildDashboard(FamilyId),
}

impl Screen {
    /// Route from configuration and session state
    #[must_use]
    pub fn route(configured: bool, session: SessionView<'_>) -> Self {
        if !configured {
            return Screen::NotConfigured;
        }
        let profile = match session {
            SessionView::Loading => return Screen::Loading,
            SessionView::SignedOut => return Screen::Welcome,
            SessionView::SignedIn(profile) => profile,
        };
        let Some(role) = profile.and_then(|p| p.role) else {
            return Screen::RoleSelection;
        };
        let Some(family) = profile.and_then(|p| p.family_id.clone()) else {
            return Screen::FamilySetup;
        };
        match role {
            Role::Parent => Screen::ParentDashboard(family),
            Role::Child => Screen::ChildDashboard(family),
        }
    }
}

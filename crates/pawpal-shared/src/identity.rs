use std::sync::RwLock;

use crate::types::UserId;

/// The authenticated principal, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
}

/// Source of the current user's identity.
///
/// Sign-in flows live outside this workspace; callers only ever ask "who is
/// signed in right now", and the answer may change between two calls.
pub trait IdentityProvider: Send + Sync {
    /// Get the authenticated user, or `None` when signed out.
    fn current_user(&self) -> Option<CurrentUser>;
}

/// An identity provider whose current user is set explicitly.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    current: RwLock<Option<UserId>>,
}

impl StaticIdentity {
    pub fn signed_in(id: UserId) -> Self {
        Self {
            current: RwLock::new(Some(id)),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, id: UserId) {
        // A poisoned lock only means a writer panicked; the Option is still valid.
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(id);
    }

    pub fn sign_out(&self) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        guard.clone().map(|id| CurrentUser { id })
    }
}

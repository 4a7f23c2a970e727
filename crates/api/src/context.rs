use navgate_auth::Identity;
use navgate_core::UserId;

/// Identity of the caller for a request, inserted by the auth middleware.
///
/// Immutable; present on every authenticated route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    identity: Identity,
}

impl IdentityContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    pub fn is_superuser(&self) -> bool {
        self.identity.is_superuser
    }
}

use serde::{Deserialize, Serialize};

use navgate_core::UserId;

/// An authenticated caller, as supplied by the token collaborator.
///
/// This engine never authenticates; it only authorizes whatever identity it is
/// handed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub is_superuser: bool,
}

impl Identity {
    pub fn new(user_id: UserId, is_superuser: bool) -> Self {
        Self {
            user_id,
            is_superuser,
        }
    }

    /// A regular user whose access is decided by grant rows alone.
    pub fn user(user_id: UserId) -> Self {
        Self::new(user_id, false)
    }

    /// A superuser bypassing all grant checks.
    pub fn superuser(user_id: UserId) -> Self {
        Self::new(user_id, true)
    }
}

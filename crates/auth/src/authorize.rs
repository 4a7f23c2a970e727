//! Access gate and admin guard.
//!
//! - No IO
//! - No panics
//! - Absence of a grant row is a normal denial, never an error

use serde::Serialize;
use thiserror::Error;

use navgate_core::ActionKey;

use crate::Identity;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {0} requires a superuser")]
    Forbidden(String),
}

/// Guard for administrative operations (catalog edits, grant replacement).
pub fn require_superuser(identity: &Identity, operation: &str) -> Result<(), AuthzError> {
    if identity.is_superuser {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(operation.to_string()))
    }
}

/// Decide a single action given the user's stored row for it (if any).
///
/// Action grants are orthogonal to the menu tree: whether the owning node is
/// visible to the user plays no part here.
pub fn action_allowed(identity: &Identity, row: Option<bool>) -> bool {
    identity.is_superuser || row == Some(true)
}

/// Why an action check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Superuser,
    ExplicitGrant,
    ExplicitDenial,
    NoGrant,
}

/// Auditable result of an action check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDecision {
    pub action_key: ActionKey,
    pub granted: bool,
    pub reason: DecisionReason,
}

/// Same rule as [`action_allowed`], with the reason attached.
pub fn decide_action(identity: &Identity, key: &ActionKey, row: Option<bool>) -> ActionDecision {
    let reason = match (identity.is_superuser, row) {
        (true, _) => DecisionReason::Superuser,
        (false, Some(true)) => DecisionReason::ExplicitGrant,
        (false, Some(false)) => DecisionReason::ExplicitDenial,
        (false, None) => DecisionReason::NoGrant,
    };

    ActionDecision {
        action_key: key.clone(),
        granted: action_allowed(identity, row),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navgate_core::UserId;

    #[test]
    fn superuser_bypasses_rows() {
        let su = Identity::superuser(UserId::new());
        assert!(action_allowed(&su, None));
        assert!(action_allowed(&su, Some(false)));
    }

    #[test]
    fn regular_user_needs_true_row() {
        let u = Identity::user(UserId::new());
        assert!(action_allowed(&u, Some(true)));
        assert!(!action_allowed(&u, Some(false)));
        assert!(!action_allowed(&u, None));
    }

    #[test]
    fn decision_reasons() {
        let key = ActionKey::new("export");
        let u = Identity::user(UserId::new());
        assert_eq!(decide_action(&u, &key, None).reason, DecisionReason::NoGrant);
        assert_eq!(
            decide_action(&u, &key, Some(false)).reason,
            DecisionReason::ExplicitDenial
        );
        let granted = decide_action(&u, &key, Some(true));
        assert!(granted.granted);
        assert_eq!(granted.reason, DecisionReason::ExplicitGrant);
    }

    #[test]
    fn admin_guard() {
        assert!(require_superuser(&Identity::superuser(UserId::new()), "delete_node").is_ok());
        let err = require_superuser(&Identity::user(UserId::new()), "delete_node").unwrap_err();
        assert_eq!(err.to_string(), "forbidden: delete_node requires a superuser");
    }
}

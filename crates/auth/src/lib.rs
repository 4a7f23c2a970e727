//! `navgate-auth`: pure authorization boundary for the navigation catalog.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns an
//! identity, a catalog snapshot and a grant set into decisions.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod jwt;
pub mod resolve;

pub use authorize::{
    action_allowed, decide_action, require_superuser, ActionDecision, AuthzError, DecisionReason,
};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use identity::Identity;
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use resolve::{resolve_accessible_tree, resolve_node_actions, ResolvedAction, ResolvedNode};

//! Store-backed permission resolver.
//!
//! Loads one consistent view per call and hands it to the pure policy in
//! `navgate-auth`.

use tracing::debug;

use navgate_auth::{
    ActionDecision, Identity, ResolvedAction, ResolvedNode, action_allowed, decide_action,
};
use navgate_core::{ActionKey, DomainError, DomainResult, NodeId};

use crate::store::PermissionStore;

/// Resolves navigation trees and action checks for an identity.
#[derive(Debug, Clone)]
pub struct PermissionResolver<S> {
    store: S,
}

impl<S> PermissionResolver<S>
where
    S: PermissionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The navigation tree `identity` may see. Unknown users get an empty tree.
    pub async fn resolve_accessible_tree(&self, identity: &Identity) -> DomainResult<Vec<ResolvedNode>> {
        let view = self.store.read_view(identity.user_id).await?;
        Ok(navgate_auth::resolve_accessible_tree(
            identity,
            &view.catalog,
            &view.grants,
        ))
    }

    /// Resolved action list of one node.
    pub async fn resolve_node_actions(
        &self,
        identity: &Identity,
        node_id: NodeId,
    ) -> DomainResult<Vec<ResolvedAction>> {
        let view = self.store.read_view(identity.user_id).await?;
        navgate_auth::resolve_node_actions(identity, &view.catalog, &view.grants, node_id)
            .ok_or_else(|| DomainError::not_found(format!("menu node {node_id}")))
    }

    /// Access gate: independent of the menu tree, `false` for unknown keys.
    pub async fn check_action_permission(
        &self,
        identity: &Identity,
        key: &ActionKey,
    ) -> DomainResult<bool> {
        if identity.is_superuser {
            return Ok(true);
        }
        let row = self.store.find_action_grant(identity.user_id, key).await?;
        let allowed = action_allowed(identity, row);
        debug!(user_id = %identity.user_id, action_key = %key, allowed, "action check");
        Ok(allowed)
    }

    /// Same decision as [`Self::check_action_permission`], with its reason.
    pub async fn explain_action_permission(
        &self,
        identity: &Identity,
        key: &ActionKey,
    ) -> DomainResult<ActionDecision> {
        let row = if identity.is_superuser {
            None
        } else {
            self.store.find_action_grant(identity.user_id, key).await?
        };
        Ok(decide_action(identity, key, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use navgate_auth::DecisionReason;
    use navgate_core::{ActionGrant, NewAction, NewMenuNode, NodeGrant, UserId};

    use crate::store::{CatalogStore, GrantStore, InMemoryPermissionStore};

    struct World {
        resolver: PermissionResolver<Arc<InMemoryPermissionStore>>,
        store: Arc<InMemoryPermissionStore>,
        root_a: NodeId,
        root_b: NodeId,
        child: NodeId,
    }

    // A(order=2) -> A.1 [a.export]; B(order=1) [b.view]
    async fn world() -> World {
        let store = Arc::new(InMemoryPermissionStore::new());
        let root_a = store
            .create_node(NewMenuNode::new("A").with_order(2))
            .await
            .unwrap()
            .id;
        let root_b = store
            .create_node(NewMenuNode::new("B").with_order(1))
            .await
            .unwrap()
            .id;
        let child = store
            .create_node(NewMenuNode::new("A.1").with_parent(root_a))
            .await
            .unwrap()
            .id;
        store
            .create_action(NewAction::new(child, "a.export"))
            .await
            .unwrap();
        store
            .create_action(NewAction::new(root_b, "b.view"))
            .await
            .unwrap();

        World {
            resolver: PermissionResolver::new(store.clone()),
            store,
            root_a,
            root_b,
            child,
        }
    }

    #[tokio::test]
    async fn superuser_tree_ignores_grants() {
        let w = world().await;
        let tree = w
            .resolver
            .resolve_accessible_tree(&Identity::superuser(UserId::new()))
            .await
            .unwrap();

        let roots: Vec<NodeId> = tree.iter().map(|n| n.id).collect();
        assert_eq!(roots, vec![w.root_b, w.root_a]);
        assert_eq!(tree[1].children[0].id, w.child);
    }

    #[tokio::test]
    async fn unknown_user_gets_empty_tree() {
        let w = world().await;
        let tree = w
            .resolver
            .resolve_accessible_tree(&Identity::user(UserId::new()))
            .await
            .unwrap();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn gate_requires_explicit_true_row() {
        let w = world().await;
        let user = UserId::new();
        let identity = Identity::user(user);
        w.store
            .replace_user_action_grants(
                user,
                vec![ActionGrant::new("a.export", true), ActionGrant::new("b.view", false)],
            )
            .await
            .unwrap();

        let check = |key: &'static str| {
            let resolver = &w.resolver;
            async move {
                resolver
                    .check_action_permission(&identity, &ActionKey::new(key))
                    .await
                    .unwrap()
            }
        };
        assert!(check("a.export").await);
        assert!(!check("b.view").await);
        assert!(!check("does.not.exist").await);
        assert!(w
            .resolver
            .check_action_permission(&Identity::superuser(user), &ActionKey::new("anything"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn action_grant_holds_without_node_visibility() {
        let w = world().await;
        let user = UserId::new();
        w.store
            .replace_user_action_grants(user, vec![ActionGrant::new("a.export", true)])
            .await
            .unwrap();

        let identity = Identity::user(user);
        assert!(w
            .resolver
            .resolve_accessible_tree(&identity)
            .await
            .unwrap()
            .is_empty());
        assert!(w
            .resolver
            .check_action_permission(&identity, &ActionKey::new("a.export"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn deleting_root_removes_transitive_grants() {
        let w = world().await;
        let user = UserId::new();
        w.store
            .replace_user_node_grants(user, vec![NodeGrant::new(w.root_a, true)])
            .await
            .unwrap();
        w.store
            .replace_user_action_grants(user, vec![ActionGrant::new("a.export", true)])
            .await
            .unwrap();

        assert!(w.store.delete_node(w.root_a).await.unwrap());

        let identity = Identity::user(user);
        assert!(w
            .resolver
            .resolve_accessible_tree(&identity)
            .await
            .unwrap()
            .is_empty());
        assert!(!w
            .resolver
            .check_action_permission(&identity, &ActionKey::new("a.export"))
            .await
            .unwrap());
        assert!(w.store.get_action(&ActionKey::new("a.export")).await.is_err());
    }

    #[tokio::test]
    async fn node_actions_and_explanations() {
        let w = world().await;
        let user = UserId::new();
        w.store
            .replace_user_action_grants(user, vec![ActionGrant::new("b.view", false)])
            .await
            .unwrap();
        let identity = Identity::user(user);

        let actions = w
            .resolver
            .resolve_node_actions(&identity, w.root_b)
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert!(!actions[0].allowed);

        let err = w
            .resolver
            .resolve_node_actions(&identity, NodeId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let decision = w
            .resolver
            .explain_action_permission(&identity, &ActionKey::new("b.view"))
            .await
            .unwrap();
        assert_eq!(decision.reason, DecisionReason::ExplicitDenial);

        let decision = w
            .resolver
            .explain_action_permission(&Identity::superuser(user), &ActionKey::new("b.view"))
            .await
            .unwrap();
        assert!(decision.granted);
        assert_eq!(decision.reason, DecisionReason::Superuser);
    }
}

//! Superuser-only administration of the catalog and of user grants.

use thiserror::Error;
use tracing::{info, warn};

use navgate_auth::{AuthzError, Identity, ResolvedNode, require_superuser};
use navgate_core::{
    ActionGrant, ActionKey, ActionPermission, DomainError, MenuNode, MenuNodePatch, NewAction,
    NewMenuNode, NodeGrant, NodeId, Page, PageRequest, UserId,
};

use crate::store::{PermissionStore, UserGrantSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type AdminResult<T> = Result<T, AdminError>;

/// Admin facade: checks the actor before touching the store.
#[derive(Debug, Clone)]
pub struct PermissionAdmin<S> {
    store: S,
}

impl<S> PermissionAdmin<S>
where
    S: PermissionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn authorize(&self, actor: &Identity, operation: &str) -> AdminResult<()> {
        require_superuser(actor, operation).map_err(|e| {
            warn!(actor = %actor.user_id, operation, "rejected admin call from non-superuser");
            AdminError::from(e)
        })
    }

    pub async fn create_node(&self, actor: &Identity, new: NewMenuNode) -> AdminResult<MenuNode> {
        self.authorize(actor, "create_node")?;
        let node = self.store.create_node(new).await?;
        info!(actor = %actor.user_id, node_id = %node.id, parent_id = ?node.parent_id, "menu node created");
        Ok(node)
    }

    pub async fn get_node(&self, actor: &Identity, id: NodeId) -> AdminResult<MenuNode> {
        self.authorize(actor, "get_node")?;
        Ok(self.store.get_node(id).await?)
    }

    pub async fn list_nodes(
        &self,
        actor: &Identity,
        include_inactive: bool,
        page: PageRequest,
    ) -> AdminResult<Page<MenuNode>> {
        self.authorize(actor, "list_nodes")?;
        Ok(self.store.list_nodes(include_inactive, page).await?)
    }

    pub async fn list_root_nodes(
        &self,
        actor: &Identity,
        include_inactive: bool,
    ) -> AdminResult<Vec<MenuNode>> {
        self.authorize(actor, "list_root_nodes")?;
        Ok(self.store.list_root_nodes(include_inactive).await?)
    }

    pub async fn update_node(
        &self,
        actor: &Identity,
        id: NodeId,
        patch: MenuNodePatch,
    ) -> AdminResult<MenuNode> {
        self.authorize(actor, "update_node")?;
        let node = self.store.update_node(id, patch).await?;
        info!(actor = %actor.user_id, node_id = %id, "menu node updated");
        Ok(node)
    }

    pub async fn delete_node(&self, actor: &Identity, id: NodeId) -> AdminResult<bool> {
        self.authorize(actor, "delete_node")?;
        let deleted = self.store.delete_node(id).await?;
        if deleted {
            info!(actor = %actor.user_id, node_id = %id, "menu node deleted with subtree");
        }
        Ok(deleted)
    }

    pub async fn create_action(
        &self,
        actor: &Identity,
        new: NewAction,
    ) -> AdminResult<ActionPermission> {
        self.authorize(actor, "create_action")?;
        let action = self.store.create_action(new).await?;
        info!(actor = %actor.user_id, action_key = %action.action_key, node_id = %action.node_id, "action created");
        Ok(action)
    }

    pub async fn get_action(&self, actor: &Identity, key: &ActionKey) -> AdminResult<ActionPermission> {
        self.authorize(actor, "get_action")?;
        Ok(self.store.get_action(key).await?)
    }

    pub async fn list_actions(
        &self,
        actor: &Identity,
        node_id: Option<NodeId>,
    ) -> AdminResult<Vec<ActionPermission>> {
        self.authorize(actor, "list_actions")?;
        Ok(self.store.list_actions(node_id).await?)
    }

    pub async fn delete_action(&self, actor: &Identity, key: &ActionKey) -> AdminResult<bool> {
        self.authorize(actor, "delete_action")?;
        let deleted = self.store.delete_action(key).await?;
        if deleted {
            info!(actor = %actor.user_id, action_key = %key, "action deleted");
        }
        Ok(deleted)
    }

    /// Replace `user`'s node grants with exactly `grants`.
    pub async fn set_user_node_grants(
        &self,
        actor: &Identity,
        user: UserId,
        grants: Vec<NodeGrant>,
    ) -> AdminResult<()> {
        self.authorize(actor, "set_user_node_grants")?;
        let count = grants.len();
        self.store.replace_user_node_grants(user, grants).await?;
        info!(actor = %actor.user_id, user_id = %user, count, "node grants replaced");
        Ok(())
    }

    /// Replace `user`'s action grants with exactly `grants`.
    pub async fn set_user_action_grants(
        &self,
        actor: &Identity,
        user: UserId,
        grants: Vec<ActionGrant>,
    ) -> AdminResult<()> {
        self.authorize(actor, "set_user_action_grants")?;
        let count = grants.len();
        self.store.replace_user_action_grants(user, grants).await?;
        info!(actor = %actor.user_id, user_id = %user, count, "action grants replaced");
        Ok(())
    }

    pub async fn get_user_grants(&self, actor: &Identity, user: UserId) -> AdminResult<UserGrantSet> {
        self.authorize(actor, "get_user_grants")?;
        Ok(self.store.get_user_grants(user).await?)
    }

    /// The tree `user` would see, resolved as a regular (non-superuser) user.
    pub async fn preview_user_tree(
        &self,
        actor: &Identity,
        user: UserId,
    ) -> AdminResult<Vec<ResolvedNode>> {
        self.authorize(actor, "preview_user_tree")?;
        let view = self.store.read_view(user).await?;
        Ok(navgate_auth::resolve_accessible_tree(
            &Identity::user(user),
            &view.catalog,
            &view.grants,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::{CatalogStore, InMemoryPermissionStore};

    fn admin() -> (PermissionAdmin<Arc<InMemoryPermissionStore>>, Arc<InMemoryPermissionStore>) {
        let store = Arc::new(InMemoryPermissionStore::new());
        (PermissionAdmin::new(store.clone()), store)
    }

    #[tokio::test]
    async fn non_superuser_is_forbidden_before_store_access() {
        let (admin, store) = admin();
        let user = Identity::user(UserId::new());

        let err = admin
            .create_node(&user, NewMenuNode::new("Sneaky"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Forbidden(_)));
        assert!(store.list_root_nodes(true).await.unwrap().is_empty());

        let err = admin
            .set_user_node_grants(&user, user.user_id, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Forbidden(_)));
    }

    #[tokio::test]
    async fn superuser_manages_catalog_and_grants() {
        let (admin, _) = admin();
        let su = Identity::superuser(UserId::new());
        let user = UserId::new();

        let root = admin.create_node(&su, NewMenuNode::new("Expenses")).await.unwrap();
        admin
            .create_action(&su, NewAction::new(root.id, "expenses.export"))
            .await
            .unwrap();
        admin
            .set_user_node_grants(&su, user, vec![NodeGrant::new(root.id, true)])
            .await
            .unwrap();
        admin
            .set_user_action_grants(&su, user, vec![ActionGrant::new("expenses.export", true)])
            .await
            .unwrap();

        let grants = admin.get_user_grants(&su, user).await.unwrap();
        assert_eq!(grants.node_grants, vec![NodeGrant::new(root.id, true)]);
        assert_eq!(grants.action_grants.len(), 1);

        let preview = admin.preview_user_tree(&su, user).await.unwrap();
        assert_eq!(preview.len(), 1);
        assert!(preview[0].actions[0].allowed);
    }

    #[tokio::test]
    async fn domain_errors_pass_through() {
        let (admin, _) = admin();
        let su = Identity::superuser(UserId::new());
        let root = admin.create_node(&su, NewMenuNode::new("Root")).await.unwrap();
        admin
            .create_action(&su, NewAction::new(root.id, "dup"))
            .await
            .unwrap();

        let err = admin
            .create_action(&su, NewAction::new(root.id, "dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Domain(DomainError::Conflict(_))));

        let err = admin
            .update_node(
                &su,
                root.id,
                MenuNodePatch {
                    parent_id: Some(Some(root.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdminError::Domain(DomainError::InvariantViolation(_))
        ));
    }
}

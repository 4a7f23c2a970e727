//! Catalog and grant persistence boundary.
//!
//! Both stores are implemented by a single backend type so that cascading
//! deletes can prune grant rows inside the same atomic unit as the node delete.

pub mod in_memory;
pub mod postgres;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use navgate_core::{
    ActionGrant, ActionKey, ActionPermission, Catalog, DomainResult, MenuNode, MenuNodePatch,
    NewAction, NewMenuNode, NodeGrant, NodeId, Page, PageRequest, UserGrants, UserId,
};

pub use in_memory::InMemoryPermissionStore;
pub use postgres::PostgresPermissionStore;

/// Menu nodes and the actions they own.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a node. The returned node carries its assigned id.
    async fn create_node(&self, new: NewMenuNode) -> DomainResult<MenuNode>;

    async fn get_node(&self, id: NodeId) -> DomainResult<MenuNode>;

    /// Nodes ordered by `order` then id.
    async fn list_nodes(
        &self,
        include_inactive: bool,
        page: PageRequest,
    ) -> DomainResult<Page<MenuNode>>;

    async fn list_root_nodes(&self, include_inactive: bool) -> DomainResult<Vec<MenuNode>>;

    async fn update_node(&self, id: NodeId, patch: MenuNodePatch) -> DomainResult<MenuNode>;

    /// Delete a node with its subtree, their actions and every grant row
    /// referencing them. `false` if the node does not exist.
    async fn delete_node(&self, id: NodeId) -> DomainResult<bool>;

    async fn create_action(&self, new: NewAction) -> DomainResult<ActionPermission>;

    async fn get_action(&self, key: &ActionKey) -> DomainResult<ActionPermission>;

    /// Actions ordered by key, optionally restricted to one node.
    async fn list_actions(&self, node_id: Option<NodeId>) -> DomainResult<Vec<ActionPermission>>;

    /// Delete an action and its grant rows. `false` if the key does not exist.
    async fn delete_action(&self, key: &ActionKey) -> DomainResult<bool>;

    /// Consistent read of the whole catalog.
    async fn snapshot(&self) -> DomainResult<Catalog>;
}

/// Per-user grant rows.
#[async_trait::async_trait]
pub trait GrantStore: Send + Sync {
    /// Atomically replace the user's node grants (bulk replace, not merge).
    async fn replace_user_node_grants(&self, user: UserId, grants: Vec<NodeGrant>)
        -> DomainResult<()>;

    /// Atomically replace the user's action grants (bulk replace, not merge).
    async fn replace_user_action_grants(
        &self,
        user: UserId,
        grants: Vec<ActionGrant>,
    ) -> DomainResult<()>;

    /// Node grants ordered by node id. Unknown users have none.
    async fn get_user_node_grants(&self, user: UserId) -> DomainResult<Vec<NodeGrant>>;

    /// Action grants ordered by key. Unknown users have none.
    async fn get_user_action_grants(&self, user: UserId) -> DomainResult<Vec<ActionGrant>>;

    /// Both grant sets, read from one consistent snapshot.
    async fn get_user_grants(&self, user: UserId) -> DomainResult<UserGrantSet>;

    /// The stored value of a single action grant row.
    async fn find_action_grant(&self, user: UserId, key: &ActionKey) -> DomainResult<Option<bool>>;

    /// Drop every grant row referencing the given nodes or actions.
    async fn prune_references_to(
        &self,
        node_ids: &HashSet<NodeId>,
        action_keys: &HashSet<ActionKey>,
    ) -> DomainResult<()>;
}

/// Both grant sets of one user, as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserGrantSet {
    pub user_id: UserId,
    pub node_grants: Vec<NodeGrant>,
    pub action_grants: Vec<ActionGrant>,
}

/// Everything resolution needs for one user, read as a single consistent unit.
#[derive(Debug, Clone, Default)]
pub struct PermissionView {
    pub catalog: Catalog,
    pub grants: UserGrants,
}

/// A backend serving both stores.
#[async_trait::async_trait]
pub trait PermissionStore: CatalogStore + GrantStore {
    async fn read_view(&self, user: UserId) -> DomainResult<PermissionView>;
}

#[async_trait::async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn create_node(&self, new: NewMenuNode) -> DomainResult<MenuNode> {
        (**self).create_node(new).await
    }

    async fn get_node(&self, id: NodeId) -> DomainResult<MenuNode> {
        (**self).get_node(id).await
    }

    async fn list_nodes(
        &self,
        include_inactive: bool,
        page: PageRequest,
    ) -> DomainResult<Page<MenuNode>> {
        (**self).list_nodes(include_inactive, page).await
    }

    async fn list_root_nodes(&self, include_inactive: bool) -> DomainResult<Vec<MenuNode>> {
        (**self).list_root_nodes(include_inactive).await
    }

    async fn update_node(&self, id: NodeId, patch: MenuNodePatch) -> DomainResult<MenuNode> {
        (**self).update_node(id, patch).await
    }

    async fn delete_node(&self, id: NodeId) -> DomainResult<bool> {
        (**self).delete_node(id).await
    }

    async fn create_action(&self, new: NewAction) -> DomainResult<ActionPermission> {
        (**self).create_action(new).await
    }

    async fn get_action(&self, key: &ActionKey) -> DomainResult<ActionPermission> {
        (**self).get_action(key).await
    }

    async fn list_actions(&self, node_id: Option<NodeId>) -> DomainResult<Vec<ActionPermission>> {
        (**self).list_actions(node_id).await
    }

    async fn delete_action(&self, key: &ActionKey) -> DomainResult<bool> {
        (**self).delete_action(key).await
    }

    async fn snapshot(&self) -> DomainResult<Catalog> {
        (**self).snapshot().await
    }
}

#[async_trait::async_trait]
impl<S> GrantStore for Arc<S>
where
    S: GrantStore + ?Sized,
{
    async fn replace_user_node_grants(
        &self,
        user: UserId,
        grants: Vec<NodeGrant>,
    ) -> DomainResult<()> {
        (**self).replace_user_node_grants(user, grants).await
    }

    async fn replace_user_action_grants(
        &self,
        user: UserId,
        grants: Vec<ActionGrant>,
    ) -> DomainResult<()> {
        (**self).replace_user_action_grants(user, grants).await
    }

    async fn get_user_node_grants(&self, user: UserId) -> DomainResult<Vec<NodeGrant>> {
        (**self).get_user_node_grants(user).await
    }

    async fn get_user_action_grants(&self, user: UserId) -> DomainResult<Vec<ActionGrant>> {
        (**self).get_user_action_grants(user).await
    }

    async fn get_user_grants(&self, user: UserId) -> DomainResult<UserGrantSet> {
        (**self).get_user_grants(user).await
    }

    async fn find_action_grant(&self, user: UserId, key: &ActionKey) -> DomainResult<Option<bool>> {
        (**self).find_action_grant(user, key).await
    }

    async fn prune_references_to(
        &self,
        node_ids: &HashSet<NodeId>,
        action_keys: &HashSet<ActionKey>,
    ) -> DomainResult<()> {
        (**self).prune_references_to(node_ids, action_keys).await
    }
}

#[async_trait::async_trait]
impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn read_view(&self, user: UserId) -> DomainResult<PermissionView> {
        (**self).read_view(user).await
    }
}

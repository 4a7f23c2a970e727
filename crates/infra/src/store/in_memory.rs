use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use navgate_core::grant::{dedupe_action_grants, dedupe_node_grants};
use navgate_core::{
    ActionGrant, ActionKey, ActionPermission, Catalog, DomainError, DomainResult, MenuNode,
    MenuNodePatch, NewAction, NewMenuNode, NodeGrant, NodeId, Page, PageRequest, UserGrants,
    UserId,
};

use super::{CatalogStore, GrantStore, PermissionStore, PermissionView, UserGrantSet};

#[derive(Debug, Clone, Default)]
struct State {
    catalog: Catalog,
    node_grants: HashMap<UserId, BTreeMap<NodeId, bool>>,
    action_grants: HashMap<UserId, BTreeMap<ActionKey, bool>>,
}

impl State {
    fn node_grants_of(&self, user: UserId) -> Vec<NodeGrant> {
        self.node_grants
            .get(&user)
            .map(|rows| rows.iter().map(|(id, allowed)| NodeGrant::new(*id, *allowed)).collect())
            .unwrap_or_default()
    }

    fn action_grants_of(&self, user: UserId) -> Vec<ActionGrant> {
        self.action_grants
            .get(&user)
            .map(|rows| {
                rows.iter()
                    .map(|(key, allowed)| ActionGrant::new(key.clone(), *allowed))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn prune(&mut self, node_ids: &HashSet<NodeId>, action_keys: &HashSet<ActionKey>) {
        for rows in self.node_grants.values_mut() {
            rows.retain(|id, _| !node_ids.contains(id));
        }
        for rows in self.action_grants.values_mut() {
            rows.retain(|key, _| !action_keys.contains(key));
        }
        self.node_grants.retain(|_, rows| !rows.is_empty());
        self.action_grants.retain(|_, rows| !rows.is_empty());
    }
}

/// In-memory catalog and grant store.
///
/// Intended for tests/dev. One lock guards the whole state; multi-step writes
/// build the next state and swap it in under the write guard, so readers
/// observe either the old or the new state.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    state: RwLock<State>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from an existing catalog.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            state: RwLock::new(State {
                catalog,
                ..State::default()
            }),
        }
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::transaction("lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::transaction("lock poisoned"))
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryPermissionStore {
    async fn create_node(&self, new: NewMenuNode) -> DomainResult<MenuNode> {
        self.write()?.catalog.add_node(new, Utc::now())
    }

    async fn get_node(&self, id: NodeId) -> DomainResult<MenuNode> {
        self.read()?
            .catalog
            .node(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("menu node {id}")))
    }

    async fn list_nodes(
        &self,
        include_inactive: bool,
        page: PageRequest,
    ) -> DomainResult<Page<MenuNode>> {
        let state = self.read()?;
        let nodes: Vec<MenuNode> = state
            .catalog
            .nodes_sorted(include_inactive)
            .into_iter()
            .cloned()
            .collect();
        Ok(Page::from_sorted(nodes, page))
    }

    async fn list_root_nodes(&self, include_inactive: bool) -> DomainResult<Vec<MenuNode>> {
        Ok(self
            .read()?
            .catalog
            .roots(include_inactive)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn update_node(&self, id: NodeId, patch: MenuNodePatch) -> DomainResult<MenuNode> {
        self.write()?.catalog.update_node(id, patch)
    }

    async fn delete_node(&self, id: NodeId) -> DomainResult<bool> {
        let mut state = self.write()?;
        let mut next = state.clone();
        let Some(removed) = next.catalog.remove_subtree(id) else {
            return Ok(false);
        };
        next.prune(&removed.node_ids, &removed.action_keys);
        *state = next;
        Ok(true)
    }

    async fn create_action(&self, new: NewAction) -> DomainResult<ActionPermission> {
        self.write()?.catalog.add_action(new)
    }

    async fn get_action(&self, key: &ActionKey) -> DomainResult<ActionPermission> {
        self.read()?
            .catalog
            .action(key)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("action '{key}'")))
    }

    async fn list_actions(&self, node_id: Option<NodeId>) -> DomainResult<Vec<ActionPermission>> {
        Ok(self
            .read()?
            .catalog
            .actions(node_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn delete_action(&self, key: &ActionKey) -> DomainResult<bool> {
        let mut state = self.write()?;
        if !state.catalog.remove_action(key) {
            return Ok(false);
        }
        state.prune(&HashSet::new(), &HashSet::from([key.clone()]));
        Ok(true)
    }

    async fn snapshot(&self) -> DomainResult<Catalog> {
        Ok(self.read()?.catalog.clone())
    }
}

#[async_trait::async_trait]
impl GrantStore for InMemoryPermissionStore {
    async fn replace_user_node_grants(
        &self,
        user: UserId,
        grants: Vec<NodeGrant>,
    ) -> DomainResult<()> {
        let mut state = self.write()?;
        if let Some(missing) = grants.iter().find(|g| !state.catalog.contains_node(g.node_id)) {
            return Err(DomainError::invalid_reference(format!(
                "menu node {} does not exist",
                missing.node_id
            )));
        }

        let rows: BTreeMap<NodeId, bool> = dedupe_node_grants(grants)
            .into_iter()
            .map(|g| (g.node_id, g.allowed))
            .collect();
        if rows.is_empty() {
            state.node_grants.remove(&user);
        } else {
            state.node_grants.insert(user, rows);
        }
        Ok(())
    }

    async fn replace_user_action_grants(
        &self,
        user: UserId,
        grants: Vec<ActionGrant>,
    ) -> DomainResult<()> {
        let mut state = self.write()?;
        if let Some(missing) = grants
            .iter()
            .find(|g| !state.catalog.contains_action(&g.action_key))
        {
            return Err(DomainError::invalid_reference(format!(
                "action '{}' does not exist",
                missing.action_key
            )));
        }

        let rows: BTreeMap<ActionKey, bool> = dedupe_action_grants(grants)
            .into_iter()
            .map(|g| (g.action_key, g.allowed))
            .collect();
        if rows.is_empty() {
            state.action_grants.remove(&user);
        } else {
            state.action_grants.insert(user, rows);
        }
        Ok(())
    }

    async fn get_user_node_grants(&self, user: UserId) -> DomainResult<Vec<NodeGrant>> {
        Ok(self.read()?.node_grants_of(user))
    }

    async fn get_user_action_grants(&self, user: UserId) -> DomainResult<Vec<ActionGrant>> {
        Ok(self.read()?.action_grants_of(user))
    }

    async fn get_user_grants(&self, user: UserId) -> DomainResult<UserGrantSet> {
        let state = self.read()?;
        Ok(UserGrantSet {
            user_id: user,
            node_grants: state.node_grants_of(user),
            action_grants: state.action_grants_of(user),
        })
    }

    async fn find_action_grant(&self, user: UserId, key: &ActionKey) -> DomainResult<Option<bool>> {
        Ok(self
            .read()?
            .action_grants
            .get(&user)
            .and_then(|rows| rows.get(key).copied()))
    }

    async fn prune_references_to(
        &self,
        node_ids: &HashSet<NodeId>,
        action_keys: &HashSet<ActionKey>,
    ) -> DomainResult<()> {
        self.write()?.prune(node_ids, action_keys);
        Ok(())
    }
}

#[async_trait::async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn read_view(&self, user: UserId) -> DomainResult<PermissionView> {
        let state = self.read()?;
        let node_grants = state.node_grants_of(user);
        let action_grants = state.action_grants_of(user);

        Ok(PermissionView {
            catalog: state.catalog.clone(),
            grants: UserGrants::new(node_grants, action_grants),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (InMemoryPermissionStore, NodeId, NodeId) {
        let store = InMemoryPermissionStore::new();
        let root = store.create_node(NewMenuNode::new("Root")).await.unwrap().id;
        let child = store
            .create_node(NewMenuNode::new("Child").with_parent(root))
            .await
            .unwrap()
            .id;
        store
            .create_action(NewAction::new(root, "root.view"))
            .await
            .unwrap();
        store
            .create_action(NewAction::new(child, "child.edit"))
            .await
            .unwrap();
        (store, root, child)
    }

    #[tokio::test]
    async fn replace_supersedes_previous_set() {
        let (store, root, child) = seeded().await;
        let user = UserId::new();

        store
            .replace_user_node_grants(user, vec![NodeGrant::new(root, true)])
            .await
            .unwrap();
        store
            .replace_user_node_grants(user, vec![NodeGrant::new(child, true)])
            .await
            .unwrap();
        assert_eq!(
            store.get_user_node_grants(user).await.unwrap(),
            vec![NodeGrant::new(child, true)]
        );

        store.replace_user_node_grants(user, vec![]).await.unwrap();
        assert!(store.get_user_node_grants(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_replace_leaves_prior_set() {
        let (store, root, _) = seeded().await;
        let user = UserId::new();
        store
            .replace_user_node_grants(user, vec![NodeGrant::new(root, true)])
            .await
            .unwrap();

        let err = store
            .replace_user_node_grants(user, vec![NodeGrant::new(NodeId::new(), true)])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
        assert_eq!(
            store.get_user_node_grants(user).await.unwrap(),
            vec![NodeGrant::new(root, true)]
        );
    }

    #[tokio::test]
    async fn delete_cascades_to_actions_and_grants() {
        let (store, root, child) = seeded().await;
        let user = UserId::new();
        store
            .replace_user_node_grants(user, vec![NodeGrant::new(child, true)])
            .await
            .unwrap();
        store
            .replace_user_action_grants(user, vec![ActionGrant::new("child.edit", true)])
            .await
            .unwrap();

        assert!(store.delete_node(root).await.unwrap());
        assert!(!store.delete_node(root).await.unwrap());

        assert!(store.list_actions(None).await.unwrap().is_empty());
        assert!(store.get_user_node_grants(user).await.unwrap().is_empty());
        assert_eq!(
            store
                .find_action_grant(user, &ActionKey::new("child.edit"))
                .await
                .unwrap(),
            None
        );
        assert!(matches!(
            store.get_node(child).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_action_prunes_its_grants() {
        let (store, _, _) = seeded().await;
        let user = UserId::new();
        store
            .replace_user_action_grants(
                user,
                vec![
                    ActionGrant::new("root.view", true),
                    ActionGrant::new("child.edit", true),
                ],
            )
            .await
            .unwrap();

        assert!(store.delete_action(&ActionKey::new("root.view")).await.unwrap());
        assert_eq!(
            store.get_user_action_grants(user).await.unwrap(),
            vec![ActionGrant::new("child.edit", true)]
        );
    }

    #[tokio::test]
    async fn prune_drops_rows_for_every_user() {
        let (store, root, child) = seeded().await;
        let (alice, bob) = (UserId::new(), UserId::new());
        for user in [alice, bob] {
            store
                .replace_user_node_grants(
                    user,
                    vec![NodeGrant::new(root, true), NodeGrant::new(child, true)],
                )
                .await
                .unwrap();
            store
                .replace_user_action_grants(user, vec![ActionGrant::new("child.edit", true)])
                .await
                .unwrap();
        }

        store
            .prune_references_to(&HashSet::from([child]), &HashSet::from([ActionKey::new("child.edit")]))
            .await
            .unwrap();

        for user in [alice, bob] {
            assert_eq!(
                store.get_user_node_grants(user).await.unwrap(),
                vec![NodeGrant::new(root, true)]
            );
            assert!(store.get_user_action_grants(user).await.unwrap().is_empty());
        }
        // Catalog rows are untouched.
        let catalog = store.snapshot().await.unwrap();
        assert_eq!(catalog.node_count(), 2);
        assert_eq!(catalog.actions(None).len(), 2);
    }

    #[tokio::test]
    async fn unknown_user_has_empty_view() {
        let (store, _, _) = seeded().await;
        let view = store.read_view(UserId::new()).await.unwrap();
        assert!(view.grants.is_empty());
        assert_eq!(view.catalog.node_count(), 2);
    }

    #[tokio::test]
    async fn list_nodes_paginates_in_order() {
        let store = InMemoryPermissionStore::new();
        for order in [3, 1, 2] {
            store
                .create_node(NewMenuNode::new(format!("n{order}")).with_order(order))
                .await
                .unwrap();
        }

        let page = store
            .list_nodes(false, PageRequest::new(1, 1))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].order, 2);
    }
}

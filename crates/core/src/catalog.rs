//! Arena of menu nodes and actions.
//!
//! Nodes are keyed by id and carry only a `parent_id` back-reference. Children
//! are always computed from that field, so there is a single source of truth for
//! the tree shape. Every mutation here validates before it touches the arena.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{ActionKey, NodeId};
use crate::menu::{ActionPermission, MenuNode, MenuNodePatch, NewAction, NewMenuNode};

/// Node ids and action keys removed by a cascading delete.
///
/// Grant stores use this to prune rows that referenced the removed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedSubtree {
    pub node_ids: HashSet<NodeId>,
    pub action_keys: HashSet<ActionKey>,
}

/// In-memory catalog: the menu tree plus the actions each node exposes.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    nodes: HashMap<NodeId, MenuNode>,
    actions: BTreeMap<ActionKey, ActionPermission>,
}

/// Children lookup built once per traversal (parent id → sorted children).
#[derive(Debug)]
pub struct ChildIndex<'a> {
    by_parent: HashMap<NodeId, Vec<&'a MenuNode>>,
}

impl<'a> ChildIndex<'a> {
    pub fn children(&self, parent: NodeId) -> &[&'a MenuNode] {
        self.by_parent.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a catalog from rows loaded out of storage.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = MenuNode>,
        actions: impl IntoIterator<Item = ActionPermission>,
    ) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (*n.id(), n)).collect(),
            actions: actions
                .into_iter()
                .map(|a| (a.id().clone(), a))
                .collect(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&MenuNode> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes ordered by `order` then id.
    pub fn nodes_sorted(&self, include_inactive: bool) -> Vec<&MenuNode> {
        let mut nodes: Vec<&MenuNode> = self
            .nodes
            .values()
            .filter(|n| include_inactive || n.is_active)
            .collect();
        nodes.sort_by_key(|n| n.sort_key());
        nodes
    }

    /// Root nodes ordered by `order` then id.
    pub fn roots(&self, include_inactive: bool) -> Vec<&MenuNode> {
        let mut roots: Vec<&MenuNode> = self
            .nodes
            .values()
            .filter(|n| n.is_root() && (include_inactive || n.is_active))
            .collect();
        roots.sort_by_key(|n| n.sort_key());
        roots
    }

    pub fn child_index(&self) -> ChildIndex<'_> {
        let mut by_parent: HashMap<NodeId, Vec<&MenuNode>> = HashMap::new();
        for node in self.nodes.values() {
            if let Some(parent) = node.parent_id {
                by_parent.entry(parent).or_default().push(node);
            }
        }
        for children in by_parent.values_mut() {
            children.sort_by_key(|n| n.sort_key());
        }
        ChildIndex { by_parent }
    }

    /// `root` and every node below it. Each node is visited once, so a corrupt
    /// parent cycle cannot loop forever.
    pub fn subtree_ids(&self, root: NodeId) -> Vec<NodeId> {
        if !self.contains_node(root) {
            return Vec::new();
        }
        let index = self.child_index();
        let mut seen = HashSet::from([root]);
        let mut out = vec![root];
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            for child in index.children(id) {
                if seen.insert(child.id) {
                    out.push(child.id);
                    worklist.push(child.id);
                }
            }
        }
        out
    }

    /// True if `ancestor` is `node` itself or appears on `node`'s parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        // The chain can be at most as long as the arena.
        for _ in 0..=self.nodes.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.nodes.get(&id).and_then(|n| n.parent_id),
                None => return false,
            }
        }
        false
    }

    /// Check that `node` may be placed under `new_parent`.
    pub fn check_parent_assignment(&self, node: NodeId, new_parent: NodeId) -> DomainResult<()> {
        if !self.contains_node(new_parent) {
            return Err(DomainError::invalid_reference(format!(
                "parent node {new_parent} does not exist"
            )));
        }
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(DomainError::invariant(format!(
                "node {node} cannot be placed under its own descendant {new_parent}"
            )));
        }
        Ok(())
    }

    pub fn add_node(&mut self, new: NewMenuNode, now: DateTime<Utc>) -> DomainResult<MenuNode> {
        if let Some(parent) = new.parent_id {
            if !self.contains_node(parent) {
                return Err(DomainError::invalid_reference(format!(
                    "parent node {parent} does not exist"
                )));
            }
        }
        let node = MenuNode::create(new, now)?;
        self.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    pub fn update_node(&mut self, id: NodeId, patch: MenuNodePatch) -> DomainResult<MenuNode> {
        if !self.contains_node(id) {
            return Err(DomainError::not_found(format!("menu node {id}")));
        }
        if let Some(parent) = patch.new_parent() {
            self.check_parent_assignment(id, parent)?;
        }

        // Apply on a copy so a validation failure leaves the arena untouched.
        let mut updated = self.nodes[&id].clone();
        updated.apply(patch)?;
        self.nodes.insert(id, updated.clone());
        Ok(updated)
    }

    /// Remove `id`, its whole subtree and every action those nodes own.
    pub fn remove_subtree(&mut self, id: NodeId) -> Option<RemovedSubtree> {
        if !self.contains_node(id) {
            return None;
        }
        let node_ids: HashSet<NodeId> = self.subtree_ids(id).into_iter().collect();
        let action_keys: HashSet<ActionKey> = self
            .actions
            .values()
            .filter(|a| node_ids.contains(&a.node_id))
            .map(|a| a.action_key.clone())
            .collect();

        self.nodes.retain(|nid, _| !node_ids.contains(nid));
        self.actions.retain(|key, _| !action_keys.contains(key));

        Some(RemovedSubtree {
            node_ids,
            action_keys,
        })
    }

    pub fn action(&self, key: &ActionKey) -> Option<&ActionPermission> {
        self.actions.get(key)
    }

    pub fn contains_action(&self, key: &ActionKey) -> bool {
        self.actions.contains_key(key)
    }

    /// Actions ordered by key; only those owned by `node` when given.
    pub fn actions(&self, node: Option<NodeId>) -> Vec<&ActionPermission> {
        self.actions
            .values()
            .filter(|a| node.is_none_or(|n| a.node_id == n))
            .collect()
    }

    pub fn add_action(&mut self, new: NewAction) -> DomainResult<ActionPermission> {
        let action = new.into_action()?;
        if !self.contains_node(action.node_id) {
            return Err(DomainError::invalid_reference(format!(
                "menu node {} does not exist",
                action.node_id
            )));
        }
        if self.contains_action(&action.action_key) {
            return Err(DomainError::conflict(format!(
                "action key '{}' already exists",
                action.action_key
            )));
        }
        self.actions.insert(action.action_key.clone(), action.clone());
        Ok(action)
    }

    pub fn remove_action(&mut self, key: &ActionKey) -> bool {
        self.actions.remove(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(catalog: &mut Catalog, new: NewMenuNode) -> NodeId {
        catalog.add_node(new, Utc::now()).unwrap().id
    }

    #[test]
    fn roots_ordered_by_order_then_id() {
        let mut c = Catalog::new();
        let a = node(&mut c, NewMenuNode::new("A").with_order(2));
        let b = node(&mut c, NewMenuNode::new("B").with_order(1));
        let d = node(&mut c, NewMenuNode::new("D").with_order(2));

        let roots: Vec<NodeId> = c.roots(false).iter().map(|n| n.id).collect();
        let mut tied = vec![a, d];
        tied.sort();
        assert_eq!(roots, vec![b, tied[0], tied[1]]);
    }

    #[test]
    fn inactive_roots_filtered_unless_requested() {
        let mut c = Catalog::new();
        node(&mut c, NewMenuNode::new("Live"));
        node(&mut c, NewMenuNode::new("Hidden").inactive());

        assert_eq!(c.roots(false).len(), 1);
        assert_eq!(c.roots(true).len(), 2);
    }

    #[test]
    fn unknown_parent_is_invalid_reference() {
        let mut c = Catalog::new();
        let err = c
            .add_node(NewMenuNode::new("Orphan").with_parent(NodeId::new()), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
        assert_eq!(c.node_count(), 0);
    }

    #[test]
    fn reparent_under_descendant_is_rejected() {
        let mut c = Catalog::new();
        let root = node(&mut c, NewMenuNode::new("Root"));
        let child = node(&mut c, NewMenuNode::new("Child").with_parent(root));
        let grandchild = node(&mut c, NewMenuNode::new("Grandchild").with_parent(child));

        let patch = MenuNodePatch {
            parent_id: Some(Some(grandchild)),
            ..Default::default()
        };
        let err = c.update_node(root, patch).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert!(c.node(root).unwrap().is_root());

        let self_parent = MenuNodePatch {
            parent_id: Some(Some(child)),
            ..Default::default()
        };
        assert!(c.update_node(child, self_parent).is_err());
    }

    #[test]
    fn reparent_to_root_with_null() {
        let mut c = Catalog::new();
        let root = node(&mut c, NewMenuNode::new("Root"));
        let child = node(&mut c, NewMenuNode::new("Child").with_parent(root));

        let updated = c
            .update_node(
                child,
                MenuNodePatch {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.is_root());
        assert_eq!(c.roots(false).len(), 2);
    }

    #[test]
    fn remove_subtree_collects_nodes_and_actions() {
        let mut c = Catalog::new();
        let root = node(&mut c, NewMenuNode::new("Root"));
        let child = node(&mut c, NewMenuNode::new("Child").with_parent(root));
        let other = node(&mut c, NewMenuNode::new("Other"));
        c.add_action(NewAction::new(root, "root.view")).unwrap();
        c.add_action(NewAction::new(child, "child.edit")).unwrap();
        c.add_action(NewAction::new(other, "other.view")).unwrap();

        let removed = c.remove_subtree(root).unwrap();
        assert_eq!(removed.node_ids, HashSet::from([root, child]));
        assert_eq!(
            removed.action_keys,
            HashSet::from([ActionKey::new("root.view"), ActionKey::new("child.edit")])
        );
        assert!(c.node(child).is_none());
        assert_eq!(c.actions(None).len(), 1);
        assert!(c.remove_subtree(root).is_none());
    }

    #[test]
    fn duplicate_action_key_conflicts_globally() {
        let mut c = Catalog::new();
        let a = node(&mut c, NewMenuNode::new("A"));
        let b = node(&mut c, NewMenuNode::new("B"));
        c.add_action(NewAction::new(a, "export")).unwrap();

        let err = c.add_action(NewAction::new(b, "export")).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(c.actions(Some(b)).len(), 0);
    }

    #[test]
    fn subtree_walk_survives_corrupt_cycle() {
        let now = Utc::now();
        let a = NodeId::new();
        let b = NodeId::new();
        let mk = |id, parent| MenuNode {
            id,
            title: "n".into(),
            icon: None,
            route: None,
            parent_id: Some(parent),
            order: 0,
            is_active: true,
            created_at: now,
        };
        let c = Catalog::from_parts([mk(a, b), mk(b, a)], []);

        assert_eq!(c.subtree_ids(a).len(), 2);
        assert!(!c.is_ancestor_or_self(NodeId::new(), a));
    }
}

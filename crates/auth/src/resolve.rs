//! Navigation tree resolution.
//!
//! Pure function of (identity, catalog snapshot, grant set). Storage and
//! transaction scoping live in `navgate-infra`; this module only decides.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use navgate_core::{ActionKey, ActionPermission, Catalog, ChildIndex, MenuNode, NodeId, UserGrants};

use crate::authorize::action_allowed;
use crate::Identity;

/// A node of the tree a user is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub title: String,
    pub icon: Option<String>,
    pub route: Option<String>,
    pub order: i32,
    pub children: Vec<ResolvedNode>,
    pub actions: Vec<ResolvedAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAction {
    pub action_key: ActionKey,
    pub allowed: bool,
}

impl ResolvedNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ResolvedNode::node_count).sum::<usize>()
    }
}

/// Resolve the navigation tree visible to `identity`.
///
/// - Superusers get every active root.
/// - Everyone else gets the active roots they hold an `allowed` node grant for.
///   Grants on non-root nodes never surface as roots.
/// - Below an accessible root the whole catalog subtree is included as-is.
pub fn resolve_accessible_tree(
    identity: &Identity,
    catalog: &Catalog,
    grants: &UserGrants,
) -> Vec<ResolvedNode> {
    let roots: Vec<&MenuNode> = catalog
        .roots(false)
        .into_iter()
        .filter(|root| identity.is_superuser || grants.node(root.id) == Some(true))
        .collect();

    let mut builder = TreeBuilder::new(identity, catalog, grants);
    let mut tree = Vec::with_capacity(roots.len());
    for root in roots {
        builder.visited.insert(root.id);
        tree.push(builder.build(root, 0));
    }

    debug!(
        user_id = %identity.user_id,
        is_superuser = identity.is_superuser,
        roots = tree.len(),
        nodes = tree.iter().map(ResolvedNode::node_count).sum::<usize>(),
        "resolved navigation tree"
    );
    tree
}

/// Resolved action list for a single node, or `None` if the node does not exist.
pub fn resolve_node_actions(
    identity: &Identity,
    catalog: &Catalog,
    grants: &UserGrants,
    node_id: NodeId,
) -> Option<Vec<ResolvedAction>> {
    catalog.node(node_id)?;
    Some(
        catalog
            .actions(Some(node_id))
            .into_iter()
            .map(|action| resolve_action(identity, grants, action))
            .collect(),
    )
}

fn resolve_action(identity: &Identity, grants: &UserGrants, action: &ActionPermission) -> ResolvedAction {
    ResolvedAction {
        action_key: action.action_key.clone(),
        allowed: action_allowed(identity, grants.action(&action.action_key)),
    }
}

struct TreeBuilder<'a> {
    identity: &'a Identity,
    grants: &'a UserGrants,
    children: ChildIndex<'a>,
    actions: HashMap<NodeId, Vec<&'a ActionPermission>>,
    visited: HashSet<NodeId>,
    max_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(identity: &'a Identity, catalog: &'a Catalog, grants: &'a UserGrants) -> Self {
        let mut actions: HashMap<NodeId, Vec<&'a ActionPermission>> = HashMap::new();
        for action in catalog.actions(None) {
            actions.entry(action.node_id).or_default().push(action);
        }

        Self {
            identity,
            grants,
            children: catalog.child_index(),
            actions,
            visited: HashSet::new(),
            max_depth: catalog.node_count(),
        }
    }

    fn build(&mut self, node: &'a MenuNode, depth: usize) -> ResolvedNode {
        let kids: Vec<&'a MenuNode> = if depth < self.max_depth {
            self.children.children(node.id).to_vec()
        } else {
            Vec::new()
        };

        let mut children = Vec::with_capacity(kids.len());
        for child in kids {
            // A node reachable twice means the parent links are corrupt.
            if self.visited.insert(child.id) {
                children.push(self.build(child, depth + 1));
            }
        }

        let actions = self
            .actions
            .get(&node.id)
            .map(|owned| {
                owned
                    .iter()
                    .map(|action| resolve_action(self.identity, self.grants, action))
                    .collect()
            })
            .unwrap_or_default();

        ResolvedNode {
            id: node.id,
            title: node.title.clone(),
            icon: node.icon.clone(),
            route: node.route.clone(),
            order: node.order,
            children,
            actions,
        }
    }
}

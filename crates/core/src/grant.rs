//! Per-user grant rows.
//!
//! Grants are closed-world: an absent row means "no permission". A node grant does
//! not inherit to or from parents/children; the resolver decides what a root
//! grant implies for its subtree.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::id::{ActionKey, NodeId};

/// One `(user, node)` row, without the user (rows are always read per user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGrant {
    #[serde(alias = "menu_item_id")]
    pub node_id: NodeId,
    #[serde(alias = "has_permission", default = "allow_by_default")]
    pub allowed: bool,
}

/// One `(user, action)` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGrant {
    #[serde(alias = "button_id")]
    pub action_key: ActionKey,
    #[serde(alias = "has_permission", default)]
    pub allowed: bool,
}

fn allow_by_default() -> bool {
    true
}

impl NodeGrant {
    pub fn new(node_id: NodeId, allowed: bool) -> Self {
        Self { node_id, allowed }
    }
}

impl ActionGrant {
    pub fn new(action_key: impl Into<ActionKey>, allowed: bool) -> Self {
        Self {
            action_key: action_key.into(),
            allowed,
        }
    }
}

/// Collapse duplicate keys, keeping the last value seen for each key.
///
/// Output keeps the position of each key's first occurrence, so replacing a
/// grant set is deterministic.
pub fn last_write_wins<K, I>(rows: I) -> Vec<(K, bool)>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = (K, bool)>,
{
    let mut position: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<(K, bool)> = Vec::new();
    for (key, allowed) in rows {
        match position.get(&key) {
            Some(&idx) => out[idx].1 = allowed,
            None => {
                position.insert(key.clone(), out.len());
                out.push((key, allowed));
            }
        }
    }
    out
}

/// Node grants with duplicates collapsed (last write wins).
pub fn dedupe_node_grants(grants: Vec<NodeGrant>) -> Vec<NodeGrant> {
    last_write_wins(grants.into_iter().map(|g| (g.node_id, g.allowed)))
        .into_iter()
        .map(|(node_id, allowed)| NodeGrant { node_id, allowed })
        .collect()
}

/// Action grants with duplicates collapsed (last write wins).
pub fn dedupe_action_grants(grants: Vec<ActionGrant>) -> Vec<ActionGrant> {
    last_write_wins(grants.into_iter().map(|g| (g.action_key, g.allowed)))
        .into_iter()
        .map(|(action_key, allowed)| ActionGrant { action_key, allowed })
        .collect()
}

/// A user's complete grant set, indexed for lookups during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGrants {
    nodes: HashMap<NodeId, bool>,
    actions: HashMap<ActionKey, bool>,
}

impl UserGrants {
    pub fn new(node_grants: Vec<NodeGrant>, action_grants: Vec<ActionGrant>) -> Self {
        Self {
            nodes: node_grants
                .into_iter()
                .map(|g| (g.node_id, g.allowed))
                .collect(),
            actions: action_grants
                .into_iter()
                .map(|g| (g.action_key, g.allowed))
                .collect(),
        }
    }

    /// The stored row for a node, if any.
    pub fn node(&self, id: NodeId) -> Option<bool> {
        self.nodes.get(&id).copied()
    }

    /// The stored row for an action, if any.
    pub fn action(&self, key: &ActionKey) -> Option<bool> {
        self.actions.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_resolve_to_last_value() {
        let a = NodeId::new();
        let b = NodeId::new();
        let deduped = dedupe_node_grants(vec![
            NodeGrant::new(a, true),
            NodeGrant::new(b, true),
            NodeGrant::new(a, false),
        ]);
        assert_eq!(deduped, vec![NodeGrant::new(a, false), NodeGrant::new(b, true)]);
    }

    #[test]
    fn accepts_legacy_field_names() {
        let id = NodeId::new();
        let g: NodeGrant = serde_json::from_str(&format!(r#"{{"menu_item_id":"{id}"}}"#)).unwrap();
        assert_eq!(g, NodeGrant::new(id, true));

        let a: ActionGrant = serde_json::from_str(r#"{"button_id":"export"}"#).unwrap();
        assert_eq!(a, ActionGrant::new("export", false));
    }

    #[test]
    fn absent_rows_are_none() {
        let grants = UserGrants::default();
        assert!(grants.is_empty());
        assert_eq!(grants.node(NodeId::new()), None);
        assert_eq!(grants.action(&ActionKey::new("x")), None);
    }
}

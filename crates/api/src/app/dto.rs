use serde::Deserialize;

use navgate_core::{ActionGrant, NodeGrant, NodeId, PageRequest};

// -------------------------
// Query parameters
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ListNodesQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_inactive: bool,
}

fn default_limit() -> usize {
    PageRequest::DEFAULT_LIMIT
}

impl ListNodesQuery {
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.skip, self.limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct RootNodesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListActionsQuery {
    #[serde(default, alias = "node_id")]
    pub menu_item_id: Option<NodeId>,
}

// -------------------------
// Request bodies
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SetNodeGrantsRequest {
    #[serde(alias = "node_grants")]
    pub menu_permissions: Vec<NodeGrant>,
}

#[derive(Debug, Deserialize)]
pub struct SetActionGrantsRequest {
    #[serde(alias = "action_grants")]
    pub button_permissions: Vec<ActionGrant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults() {
        let q: ListNodesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page(), PageRequest::default());
        assert!(!q.include_inactive);
    }

    #[test]
    fn grant_bodies_accept_both_spellings() {
        let body: SetActionGrantsRequest = serde_json::from_str(
            r#"{"button_permissions":[{"button_id":"export","has_permission":true}]}"#,
        )
        .unwrap();
        assert_eq!(body.button_permissions, vec![ActionGrant::new("export", true)]);

        let body: SetNodeGrantsRequest = serde_json::from_str(r#"{"node_grants":[]}"#).unwrap();
        assert!(body.menu_permissions.is_empty());
    }
}

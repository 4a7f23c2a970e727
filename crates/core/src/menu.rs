//! Menu nodes and the actions ("buttons") they expose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{ActionKey, NodeId};

const TITLE_MAX: usize = 50;
const ICON_MAX: usize = 30;
const ROUTE_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 100;

/// A navigation entry in the catalog tree.
///
/// Only the back-reference to the parent is stored; children are derived by
/// looking up nodes whose `parent_id` points here (see [`crate::Catalog`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    pub id: NodeId,
    pub title: String,
    pub icon: Option<String>,
    pub route: Option<String>,
    pub parent_id: Option<NodeId>,
    pub order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for MenuNode {
    type Id = NodeId;

    fn id(&self) -> &NodeId {
        &self.id
    }
}

impl MenuNode {
    /// Build a node from a create request (fields validated, id and timestamp assigned).
    pub fn create(new: NewMenuNode, now: DateTime<Utc>) -> DomainResult<Self> {
        new.validate()?;
        Ok(Self {
            id: NodeId::new(),
            title: new.title.trim().to_string(),
            icon: new.icon.map(|i| i.trim().to_string()),
            route: new.route.map(|r| r.trim().to_string()),
            parent_id: new.parent_id,
            order: new.order,
            is_active: new.is_active,
            created_at: now,
        })
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Apply a partial update. Reference and cycle checks on `parent_id` are the
    /// caller's job (they need the whole catalog).
    pub fn apply(&mut self, patch: MenuNodePatch) -> DomainResult<()> {
        patch.validate()?;
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(icon) = patch.icon {
            self.icon = Some(icon.trim().to_string());
        }
        if let Some(route) = patch.route {
            self.route = Some(route.trim().to_string());
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        Ok(())
    }

    /// Sort key for siblings: `order` ascending, ties broken by id.
    pub fn sort_key(&self) -> (i32, NodeId) {
        (self.order, self.id)
    }
}

/// Create request for a menu node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMenuNode {
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewMenuNode {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: None,
            route: None,
            parent_id: None,
            order: 0,
            is_active: true,
        }
    }

    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)?;
        validate_optional("icon", self.icon.as_deref(), ICON_MAX)?;
        validate_optional("route", self.route.as_deref(), ROUTE_MAX)
    }
}

/// Partial update for a menu node. `None` leaves a field unchanged.
///
/// `parent_id` is tri-state: absent (unchanged), `Some(None)` (make root) or
/// `Some(Some(id))` (reparent). In JSON: missing, `null`, or an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNodePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default, deserialize_with = "present_or_null", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<NodeId>>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl MenuNodePatch {
    /// The new parent this patch assigns, if it assigns one.
    pub fn new_parent(&self) -> Option<NodeId> {
        self.parent_id.flatten()
    }

    fn validate(&self) -> DomainResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_optional("icon", self.icon.as_deref(), ICON_MAX)?;
        validate_optional("route", self.route.as_deref(), ROUTE_MAX)
    }
}

// A present field deserializes to `Some(inner)`, so `null` becomes `Some(None)`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<NodeId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NodeId>::deserialize(deserializer).map(Some)
}

/// A guarded action surfaced by exactly one menu node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPermission {
    pub action_key: ActionKey,
    pub description: Option<String>,
    pub node_id: NodeId,
}

impl Entity for ActionPermission {
    type Id = ActionKey;

    fn id(&self) -> &ActionKey {
        &self.action_key
    }
}

/// Create request for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAction {
    pub node_id: NodeId,
    pub action_key: ActionKey,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewAction {
    pub fn new(node_id: NodeId, action_key: impl Into<ActionKey>) -> Self {
        Self {
            node_id,
            action_key: action_key.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate fields and produce the entity (node existence is checked by the store).
    pub fn into_action(self) -> DomainResult<ActionPermission> {
        self.action_key.validate()?;
        validate_optional("description", self.description.as_deref(), DESCRIPTION_MAX)?;
        Ok(ActionPermission {
            action_key: ActionKey::new(self.action_key.as_str().trim()),
            description: self.description.map(|d| d.trim().to_string()),
            node_id: self.node_id,
        })
    }
}

fn validate_title(title: &str) -> DomainResult<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    if title.chars().count() > TITLE_MAX {
        return Err(DomainError::validation(format!(
            "title must be at most {TITLE_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_optional(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.trim().chars().count() > max => Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_and_defaults() {
        let node = MenuNode::create(NewMenuNode::new("  Expenses ").with_route("/expenses"), Utc::now())
            .unwrap();
        assert_eq!(node.title, "Expenses");
        assert!(node.is_active);
        assert!(node.is_root());
        assert_eq!(node.order, 0);
    }

    #[test]
    fn empty_title_rejected() {
        let err = MenuNode::create(NewMenuNode::new("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn oversized_route_rejected() {
        let new = NewMenuNode::new("Reports").with_route("/".repeat(101));
        assert!(MenuNode::create(new, Utc::now()).is_err());
    }

    #[test]
    fn action_description_is_length_checked() {
        let node = NodeId::new();
        let action = NewAction::new(node, "ledger.export")
            .with_description("Export the ledger")
            .into_action()
            .unwrap();
        assert_eq!(action.description.as_deref(), Some("Export the ledger"));

        let err = NewAction::new(node, "ledger.export")
            .with_description("x".repeat(101))
            .into_action()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn patch_leaves_unspecified_fields() {
        let mut node = MenuNode::create(
            NewMenuNode::new("Ledger").with_icon("book").with_order(3),
            Utc::now(),
        )
        .unwrap();

        node.apply(MenuNodePatch {
            title: Some("General Ledger".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(node.title, "General Ledger");
        assert_eq!(node.icon.as_deref(), Some("book"));
        assert_eq!(node.order, 3);
    }

    #[test]
    fn patch_parent_is_tri_state_in_json() {
        let absent: MenuNodePatch = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(absent.parent_id, None);

        let null: MenuNodePatch = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));

        let id = NodeId::new();
        let set: MenuNodePatch =
            serde_json::from_str(&format!(r#"{{"parent_id":"{id}"}}"#)).unwrap();
        assert_eq!(set.new_parent(), Some(id));
    }

    #[test]
    fn action_key_is_trimmed() {
        let action = NewAction::new(NodeId::new(), " export ").into_action().unwrap();
        assert_eq!(action.action_key.as_str(), "export");
    }
}

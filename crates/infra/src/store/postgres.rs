//! Postgres-backed catalog and grant store.
//!
//! Every write runs in one transaction (`begin → … → commit`); dropping the
//! transaction on an early return rolls it back, so a failed write applies no
//! mutation.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | DomainError |
//! |------------|----------------------|-------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `InvalidReference` |
//! | Database (check violation / value too long) | `23514` / `22001` | `Validation` |
//! | Database (other), PoolClosed, network, … | Any other | `TransactionFailure` |
//!
//! ## Locking
//!
//! - Structural catalog writes (reparent, cascading delete) serialize on one
//!   transaction-scoped advisory lock so concurrent reparents cannot form a cycle.
//! - Grant replacement takes a per-user advisory lock around delete + insert, so
//!   concurrent replaces for one user end in exactly one of the submitted sets.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{Span, debug, field, instrument};
use uuid::Uuid;

use navgate_core::grant::{dedupe_action_grants, dedupe_node_grants};
use navgate_core::{
    ActionGrant, ActionKey, ActionPermission, Catalog, DomainError, DomainResult, MenuNode,
    MenuNodePatch, NewAction, NewMenuNode, NodeGrant, NodeId, Page, PageRequest, UserGrants,
    UserId,
};

use super::{CatalogStore, GrantStore, PermissionStore, PermissionView, UserGrantSet};

const SCHEMA: &str = include_str!("schema.sql");

/// Advisory lock key for structural catalog writes.
const CATALOG_LOCK_KEY: i64 = 0x6e61_7667_6174_6531;

const NODE_COLUMNS: &str =
    "id, title, icon, route, parent_id, sort_order, is_active, created_at";

/// Postgres-backed implementation of [`CatalogStore`] and [`GrantStore`].
///
/// `Send + Sync`; all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresPermissionStore {
    pool: Arc<PgPool>,
}

impl PostgresPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> DomainResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self, operation: &str) -> DomainResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Read-only transaction over one consistent snapshot.
    async fn begin_snapshot(&self, operation: &str) -> DomainResult<Transaction<'static, Postgres>> {
        let mut tx = self.begin(operation).await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(tx)
    }
}

async fn commit(tx: Transaction<'_, Postgres>, operation: &str) -> DomainResult<()> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error(operation, e))
}

async fn advisory_lock(conn: &mut PgConnection, key: i64) -> DomainResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error("advisory_lock", e))?;
    Ok(())
}

/// `LIMIT`/`OFFSET` value; saturates instead of wrapping negative.
fn sql_bound(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn user_lock_key(user: UserId) -> i64 {
    let (hi, lo) = user.as_uuid().as_u64_pair();
    (hi ^ lo) as i64
}

async fn fetch_node(
    conn: &mut PgConnection,
    id: NodeId,
    for_update: bool,
) -> DomainResult<Option<MenuNode>> {
    let sql = format!(
        "SELECT {NODE_COLUMNS} FROM menu_nodes WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, NodeRow>(&sql)
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("fetch_node", e))?;
    Ok(row.map(Into::into))
}

/// Lock the parent row so a concurrent delete cannot orphan the insert.
async fn require_node(conn: &mut PgConnection, id: NodeId) -> DomainResult<()> {
    let exists = sqlx::query("SELECT 1 FROM menu_nodes WHERE id = $1 FOR SHARE")
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("require_node", e))?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(DomainError::invalid_reference(format!(
            "menu node {id} does not exist"
        )))
    }
}

/// `root` and all its descendants. `UNION` (not `UNION ALL`) stops on revisits.
async fn subtree_ids(conn: &mut PgConnection, root: NodeId) -> DomainResult<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        WITH RECURSIVE subtree(id) AS (
            SELECT id FROM menu_nodes WHERE id = $1
            UNION
            SELECT n.id FROM menu_nodes n JOIN subtree s ON n.parent_id = s.id
        )
        SELECT id FROM subtree
        "#,
    )
    .bind(root.as_uuid())
    .fetch_all(conn)
    .await
    .map_err(|e| map_sqlx_error("subtree_ids", e))?;

    rows.iter()
        .map(|row| row.try_get::<Uuid, _>("id"))
        .collect::<Result<_, _>>()
        .map_err(|e| map_sqlx_error("subtree_ids", e))
}

async fn prune_in(
    conn: &mut PgConnection,
    node_ids: &[Uuid],
    action_keys: &[String],
) -> DomainResult<()> {
    if !node_ids.is_empty() {
        sqlx::query("DELETE FROM user_node_grants WHERE node_id = ANY($1)")
            .bind(node_ids)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("prune_node_grants", e))?;
    }
    if !action_keys.is_empty() {
        sqlx::query("DELETE FROM user_action_grants WHERE action_key = ANY($1)")
            .bind(action_keys)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("prune_action_grants", e))?;
    }
    Ok(())
}

async fn load_catalog(conn: &mut PgConnection) -> DomainResult<Catalog> {
    let nodes = sqlx::query_as::<_, NodeRow>(&format!("SELECT {NODE_COLUMNS} FROM menu_nodes"))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_nodes", e))?;
    let actions = sqlx::query_as::<_, ActionRow>(
        "SELECT action_key, description, node_id FROM menu_actions",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_actions", e))?;

    Ok(Catalog::from_parts(
        nodes.into_iter().map(Into::into),
        actions.into_iter().map(Into::into),
    ))
}

async fn load_node_grants(conn: &mut PgConnection, user: UserId) -> DomainResult<Vec<NodeGrant>> {
    let rows = sqlx::query(
        "SELECT node_id, allowed FROM user_node_grants WHERE user_id = $1 ORDER BY node_id",
    )
    .bind(user.as_uuid())
    .fetch_all(conn)
    .await
    .map_err(|e| map_sqlx_error("load_node_grants", e))?;

    rows.iter()
        .map(|row| {
            Ok(NodeGrant::new(
                NodeId::from_uuid(row.try_get("node_id")?),
                row.try_get("allowed")?,
            ))
        })
        .collect::<Result<_, sqlx::Error>>()
        .map_err(|e| map_sqlx_error("load_node_grants", e))
}

async fn load_action_grants(
    conn: &mut PgConnection,
    user: UserId,
) -> DomainResult<Vec<ActionGrant>> {
    let rows = sqlx::query(
        r#"
        SELECT action_key, allowed FROM user_action_grants
        WHERE user_id = $1
        ORDER BY action_key COLLATE "C"
        "#,
    )
    .bind(user.as_uuid())
    .fetch_all(conn)
    .await
    .map_err(|e| map_sqlx_error("load_action_grants", e))?;

    rows.iter()
        .map(|row| {
            Ok(ActionGrant::new(
                row.try_get::<String, _>("action_key")?,
                row.try_get("allowed")?,
            ))
        })
        .collect::<Result<_, sqlx::Error>>()
        .map_err(|e| map_sqlx_error("load_action_grants", e))
}

#[async_trait::async_trait]
impl CatalogStore for PostgresPermissionStore {
    #[instrument(skip(self, new), fields(title = %new.title, parent_id = ?new.parent_id), err)]
    async fn create_node(&self, new: NewMenuNode) -> DomainResult<MenuNode> {
        let node = MenuNode::create(new, Utc::now())?;
        let mut tx = self.begin("create_node").await?;

        if let Some(parent) = node.parent_id {
            require_node(&mut tx, parent).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO menu_nodes (id, title, icon, route, parent_id, sort_order, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(node.id.as_uuid())
        .bind(&node.title)
        .bind(&node.icon)
        .bind(&node.route)
        .bind(node.parent_id.map(Uuid::from))
        .bind(node.order)
        .bind(node.is_active)
        .bind(node.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_node", e))?;

        commit(tx, "create_node").await?;
        Ok(node)
    }

    #[instrument(skip(self), fields(node_id = %id), err)]
    async fn get_node(&self, id: NodeId) -> DomainResult<MenuNode> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("get_node", e))?;
        fetch_node(&mut conn, id, false)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("menu node {id}")))
    }

    #[instrument(skip(self), fields(total = field::Empty), err)]
    async fn list_nodes(
        &self,
        include_inactive: bool,
        page: PageRequest,
    ) -> DomainResult<Page<MenuNode>> {
        let mut tx = self.begin_snapshot("list_nodes").await?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM menu_nodes WHERE ($1 OR is_active)")
            .bind(include_inactive)
            .fetch_one(&mut *tx)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_nodes", e))?;

        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            SELECT {NODE_COLUMNS} FROM menu_nodes
            WHERE ($1 OR is_active)
            ORDER BY sort_order ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(include_inactive)
        .bind(sql_bound(page.limit))
        .bind(sql_bound(page.offset))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("list_nodes", e))?;

        commit(tx, "list_nodes").await?;
        Span::current().record("total", total);

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            offset: page.offset,
            limit: page.limit,
            total: total as usize,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_root_nodes(&self, include_inactive: bool) -> DomainResult<Vec<MenuNode>> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            SELECT {NODE_COLUMNS} FROM menu_nodes
            WHERE parent_id IS NULL AND ($1 OR is_active)
            ORDER BY sort_order ASC, id ASC
            "#
        ))
        .bind(include_inactive)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_root_nodes", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, patch), fields(node_id = %id), err)]
    async fn update_node(&self, id: NodeId, patch: MenuNodePatch) -> DomainResult<MenuNode> {
        let mut tx = self.begin("update_node").await?;

        if patch.parent_id.is_some() {
            advisory_lock(&mut tx, CATALOG_LOCK_KEY).await?;
        }

        let mut node = fetch_node(&mut tx, id, true)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("menu node {id}")))?;

        if let Some(parent) = patch.new_parent() {
            require_node(&mut tx, parent).await?;
            if subtree_ids(&mut tx, id).await?.contains(parent.as_uuid()) {
                return Err(DomainError::invariant(format!(
                    "node {id} cannot be placed under its own descendant {parent}"
                )));
            }
        }

        node.apply(patch)?;

        sqlx::query(
            r#"
            UPDATE menu_nodes
            SET title = $2, icon = $3, route = $4, parent_id = $5, sort_order = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(node.id.as_uuid())
        .bind(&node.title)
        .bind(&node.icon)
        .bind(&node.route)
        .bind(node.parent_id.map(Uuid::from))
        .bind(node.order)
        .bind(node.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_node", e))?;

        commit(tx, "update_node").await?;
        Ok(node)
    }

    #[instrument(skip(self), fields(node_id = %id, removed_nodes = field::Empty), err)]
    async fn delete_node(&self, id: NodeId) -> DomainResult<bool> {
        let mut tx = self.begin("delete_node").await?;
        advisory_lock(&mut tx, CATALOG_LOCK_KEY).await?;

        let node_ids = subtree_ids(&mut tx, id).await?;
        if node_ids.is_empty() {
            return Ok(false);
        }

        let action_keys: Vec<String> = sqlx::query(
            "SELECT action_key FROM menu_actions WHERE node_id = ANY($1)",
        )
        .bind(&node_ids)
        .fetch_all(&mut *tx)
        .await
        .and_then(|rows| rows.iter().map(|row| row.try_get("action_key")).collect())
        .map_err(|e| map_sqlx_error("delete_node", e))?;

        prune_in(&mut tx, &node_ids, &action_keys).await?;

        sqlx::query("DELETE FROM menu_actions WHERE node_id = ANY($1)")
            .bind(&node_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_actions", e))?;
        sqlx::query("DELETE FROM menu_nodes WHERE id = ANY($1)")
            .bind(&node_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_nodes", e))?;

        commit(tx, "delete_node").await?;
        Span::current().record("removed_nodes", node_ids.len());
        Ok(true)
    }

    #[instrument(skip(self, new), fields(action_key = %new.action_key, node_id = %new.node_id), err)]
    async fn create_action(&self, new: NewAction) -> DomainResult<ActionPermission> {
        let action = new.into_action()?;
        let mut tx = self.begin("create_action").await?;
        require_node(&mut tx, action.node_id).await?;

        sqlx::query("INSERT INTO menu_actions (action_key, description, node_id) VALUES ($1, $2, $3)")
            .bind(action.action_key.as_str())
            .bind(&action.description)
            .bind(action.node_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::conflict(format!(
                        "action key '{}' already exists",
                        action.action_key
                    ))
                } else {
                    map_sqlx_error("create_action", e)
                }
            })?;

        commit(tx, "create_action").await?;
        Ok(action)
    }

    #[instrument(skip(self), fields(action_key = %key), err)]
    async fn get_action(&self, key: &ActionKey) -> DomainResult<ActionPermission> {
        sqlx::query_as::<_, ActionRow>(
            "SELECT action_key, description, node_id FROM menu_actions WHERE action_key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_action", e))?
        .map(Into::into)
        .ok_or_else(|| DomainError::not_found(format!("action '{key}'")))
    }

    #[instrument(skip(self), err)]
    async fn list_actions(&self, node_id: Option<NodeId>) -> DomainResult<Vec<ActionPermission>> {
        let rows = sqlx::query_as::<_, ActionRow>(
            r#"
            SELECT action_key, description, node_id FROM menu_actions
            WHERE ($1::uuid IS NULL OR node_id = $1)
            ORDER BY action_key COLLATE "C"
            "#,
        )
        .bind(node_id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_actions", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(action_key = %key), err)]
    async fn delete_action(&self, key: &ActionKey) -> DomainResult<bool> {
        let mut tx = self.begin("delete_action").await?;
        prune_in(&mut tx, &[], &[key.as_str().to_string()]).await?;

        let deleted = sqlx::query("DELETE FROM menu_actions WHERE action_key = $1")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_action", e))?
            .rows_affected();

        commit(tx, "delete_action").await?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self), err)]
    async fn snapshot(&self) -> DomainResult<Catalog> {
        let mut tx = self.begin_snapshot("snapshot").await?;
        let catalog = load_catalog(&mut tx).await?;
        commit(tx, "snapshot").await?;
        Ok(catalog)
    }
}

#[async_trait::async_trait]
impl GrantStore for PostgresPermissionStore {
    #[instrument(skip(self, grants), fields(user_id = %user, grant_count = grants.len()), err)]
    async fn replace_user_node_grants(
        &self,
        user: UserId,
        grants: Vec<NodeGrant>,
    ) -> DomainResult<()> {
        let grants = dedupe_node_grants(grants);
        let ids: Vec<Uuid> = grants.iter().map(|g| *g.node_id.as_uuid()).collect();
        let allowed: Vec<bool> = grants.iter().map(|g| g.allowed).collect();

        let mut tx = self.begin("replace_user_node_grants").await?;
        advisory_lock(&mut tx, user_lock_key(user)).await?;

        if !ids.is_empty() {
            let found: HashSet<Uuid> = sqlx::query("SELECT id FROM menu_nodes WHERE id = ANY($1) FOR SHARE")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await
                .and_then(|rows| rows.iter().map(|row| row.try_get("id")).collect())
                .map_err(|e| map_sqlx_error("replace_user_node_grants", e))?;
            if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
                return Err(DomainError::invalid_reference(format!(
                    "menu node {missing} does not exist"
                )));
            }
        }

        sqlx::query("DELETE FROM user_node_grants WHERE user_id = $1")
            .bind(user.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_user_node_grants", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_node_grants (user_id, node_id, allowed)
            SELECT $1, g.node_id, g.allowed
            FROM UNNEST($2::uuid[], $3::bool[]) AS g(node_id, allowed)
            "#,
        )
        .bind(user.as_uuid())
        .bind(&ids)
        .bind(&allowed)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_user_node_grants", e))?;

        commit(tx, "replace_user_node_grants").await?;
        debug!(user_id = %user, rows = ids.len(), "node grants replaced");
        Ok(())
    }

    #[instrument(skip(self, grants), fields(user_id = %user, grant_count = grants.len()), err)]
    async fn replace_user_action_grants(
        &self,
        user: UserId,
        grants: Vec<ActionGrant>,
    ) -> DomainResult<()> {
        let grants = dedupe_action_grants(grants);
        let keys: Vec<String> = grants.iter().map(|g| g.action_key.to_string()).collect();
        let allowed: Vec<bool> = grants.iter().map(|g| g.allowed).collect();

        let mut tx = self.begin("replace_user_action_grants").await?;
        advisory_lock(&mut tx, user_lock_key(user)).await?;

        if !keys.is_empty() {
            let found: HashSet<String> = sqlx::query(
                "SELECT action_key FROM menu_actions WHERE action_key = ANY($1) FOR SHARE",
            )
            .bind(&keys)
            .fetch_all(&mut *tx)
            .await
            .and_then(|rows| rows.iter().map(|row| row.try_get("action_key")).collect())
            .map_err(|e| map_sqlx_error("replace_user_action_grants", e))?;
            if let Some(missing) = keys.iter().find(|key| !found.contains(*key)) {
                return Err(DomainError::invalid_reference(format!(
                    "action '{missing}' does not exist"
                )));
            }
        }

        sqlx::query("DELETE FROM user_action_grants WHERE user_id = $1")
            .bind(user.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_user_action_grants", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_action_grants (user_id, action_key, allowed)
            SELECT $1, g.action_key, g.allowed
            FROM UNNEST($2::text[], $3::bool[]) AS g(action_key, allowed)
            "#,
        )
        .bind(user.as_uuid())
        .bind(&keys)
        .bind(&allowed)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_user_action_grants", e))?;

        commit(tx, "replace_user_action_grants").await?;
        debug!(user_id = %user, rows = keys.len(), "action grants replaced");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn get_user_node_grants(&self, user: UserId) -> DomainResult<Vec<NodeGrant>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("get_user_node_grants", e))?;
        load_node_grants(&mut conn, user).await
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn get_user_action_grants(&self, user: UserId) -> DomainResult<Vec<ActionGrant>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("get_user_action_grants", e))?;
        load_action_grants(&mut conn, user).await
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn get_user_grants(&self, user: UserId) -> DomainResult<UserGrantSet> {
        let mut tx = self.begin_snapshot("get_user_grants").await?;
        let node_grants = load_node_grants(&mut tx, user).await?;
        let action_grants = load_action_grants(&mut tx, user).await?;
        commit(tx, "get_user_grants").await?;

        Ok(UserGrantSet {
            user_id: user,
            node_grants,
            action_grants,
        })
    }

    #[instrument(skip(self), fields(user_id = %user, action_key = %key), err)]
    async fn find_action_grant(&self, user: UserId, key: &ActionKey) -> DomainResult<Option<bool>> {
        let row = sqlx::query(
            "SELECT allowed FROM user_action_grants WHERE user_id = $1 AND action_key = $2",
        )
        .bind(user.as_uuid())
        .bind(key.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_action_grant", e))?;

        row.map(|row| row.try_get("allowed"))
            .transpose()
            .map_err(|e| map_sqlx_error("find_action_grant", e))
    }

    #[instrument(skip(self, node_ids, action_keys), fields(nodes = node_ids.len(), actions = action_keys.len()), err)]
    async fn prune_references_to(
        &self,
        node_ids: &HashSet<NodeId>,
        action_keys: &HashSet<ActionKey>,
    ) -> DomainResult<()> {
        let ids: Vec<Uuid> = node_ids.iter().map(|id| *id.as_uuid()).collect();
        let keys: Vec<String> = action_keys.iter().map(ToString::to_string).collect();

        let mut tx = self.begin("prune_references_to").await?;
        prune_in(&mut tx, &ids, &keys).await?;
        commit(tx, "prune_references_to").await
    }
}

#[async_trait::async_trait]
impl PermissionStore for PostgresPermissionStore {
    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn read_view(&self, user: UserId) -> DomainResult<PermissionView> {
        let mut tx = self.begin_snapshot("read_view").await?;
        let catalog = load_catalog(&mut tx).await?;
        let node_grants = load_node_grants(&mut tx, user).await?;
        let action_grants = load_action_grants(&mut tx, user).await?;
        commit(tx, "read_view").await?;

        Ok(PermissionView {
            catalog,
            grants: UserGrants::new(node_grants, action_grants),
        })
    }
}

/// Map SQLx errors to `DomainError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::Conflict(msg),
                Some("23503") => DomainError::InvalidReference(msg),
                Some("23514") | Some("22001") => DomainError::Validation(msg),
                _ => DomainError::TransactionFailure(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::transaction(format!("connection pool closed in {operation}"))
        }
        _ => DomainError::transaction(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct NodeRow {
    id: Uuid,
    title: String,
    icon: Option<String>,
    route: Option<String>,
    parent_id: Option<Uuid>,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for NodeRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(NodeRow {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            icon: row.try_get("icon")?,
            route: row.try_get("route")?,
            parent_id: row.try_get("parent_id")?,
            sort_order: row.try_get("sort_order")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<NodeRow> for MenuNode {
    fn from(row: NodeRow) -> Self {
        MenuNode {
            id: NodeId::from_uuid(row.id),
            title: row.title,
            icon: row.icon,
            route: row.route,
            parent_id: row.parent_id.map(NodeId::from_uuid),
            order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct ActionRow {
    action_key: String,
    description: Option<String>,
    node_id: Uuid,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ActionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ActionRow {
            action_key: row.try_get("action_key")?,
            description: row.try_get("description")?,
            node_id: row.try_get("node_id")?,
        })
    }
}

impl From<ActionRow> for ActionPermission {
    fn from(row: ActionRow) -> Self {
        ActionPermission {
            action_key: ActionKey::new(row.action_key),
            description: row.description,
            node_id: NodeId::from_uuid(row.node_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lock_key_is_stable() {
        let user = UserId::new();
        assert_eq!(user_lock_key(user), user_lock_key(user));
    }

    #[test]
    fn schema_declares_all_relations() {
        for table in ["menu_nodes", "menu_actions", "user_node_grants", "user_action_grants"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }

    #[test]
    fn sql_bounds_saturate_instead_of_wrapping() {
        assert_eq!(sql_bound(0), 0);
        assert_eq!(sql_bound(500), 500);
        assert_eq!(sql_bound(usize::MAX), i64::MAX);
    }

    #[test]
    fn pool_closed_is_transaction_failure() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolClosed),
            DomainError::TransactionFailure(_)
        ));
    }

    #[test]
    fn node_row_maps_sort_order() {
        let now = Utc::now();
        let parent = Uuid::now_v7();
        let node: MenuNode = NodeRow {
            id: Uuid::now_v7(),
            title: "Reports".into(),
            icon: None,
            route: Some("/reports".into()),
            parent_id: Some(parent),
            sort_order: 7,
            is_active: true,
            created_at: now,
        }
        .into();
        assert_eq!(node.order, 7);
        assert_eq!(node.parent_id, Some(NodeId::from_uuid(parent)));
    }
}

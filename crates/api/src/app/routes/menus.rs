//! Catalog node administration (superuser only).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use navgate_core::{MenuNodePatch, NewMenuNode, NodeId};

use crate::app::{dto, errors, services::AppServices};
use crate::context::IdentityContext;

pub fn router() -> Router {
    Router::new()
        .route("/menus", get(list_nodes).post(create_node))
        .route("/menus/roots", get(list_root_nodes))
        .route("/menus/:id", get(get_node).put(update_node).delete(delete_node))
}

/// GET /menus?skip&limit&include_inactive
pub async fn list_nodes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Query(query): Query<dto::ListNodesQuery>,
) -> axum::response::Response {
    match services
        .admin
        .list_nodes(ctx.identity(), query.include_inactive, query.page())
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// GET /menus/roots?include_inactive
pub async fn list_root_nodes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Query(query): Query<dto::RootNodesQuery>,
) -> axum::response::Response {
    match services
        .admin
        .list_root_nodes(ctx.identity(), query.include_inactive)
        .await
    {
        Ok(nodes) => (StatusCode::OK, Json(nodes)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

pub async fn create_node(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Json(body): Json<NewMenuNode>,
) -> axum::response::Response {
    match services.admin.create_node(ctx.identity(), body).await {
        Ok(node) => (StatusCode::CREATED, Json(node)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

pub async fn get_node(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NodeId = match errors::parse_id(&id, "menu node") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.admin.get_node(ctx.identity(), id).await {
        Ok(node) => (StatusCode::OK, Json(node)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// PUT /menus/:id - partial update; `"parent_id": null` moves the node to the root level.
pub async fn update_node(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<String>,
    Json(patch): Json<MenuNodePatch>,
) -> axum::response::Response {
    let id: NodeId = match errors::parse_id(&id, "menu node") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.admin.update_node(ctx.identity(), id, patch).await {
        Ok(node) => (StatusCode::OK, Json(node)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// DELETE /menus/:id - removes the subtree, its actions and their grants.
pub async fn delete_node(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NodeId = match errors::parse_id(&id, "menu node") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.admin.delete_node(ctx.identity(), id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "menu node deleted" })),
        )
            .into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "menu node not found"),
        Err(e) => errors::admin_error_to_response(e),
    }
}

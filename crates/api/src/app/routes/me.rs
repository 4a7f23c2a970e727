//! Self-service endpoints: the caller's own tree and action checks.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use navgate_core::{ActionKey, NodeId};

use crate::app::{errors, services::AppServices};
use crate::context::IdentityContext;

pub fn router() -> Router {
    Router::new()
        .route("/menus/users/me/menus", get(my_tree))
        .route("/menus/users/me/buttons/:action_key/check", get(check_action))
        .route("/menus/users/me/buttons/:action_key/explain", get(explain_action))
        .route("/menus/users/me/nodes/:id/buttons", get(node_actions))
}

/// GET /menus/users/me/menus - the navigation tree visible to the caller.
pub async fn my_tree(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
) -> axum::response::Response {
    match services.resolver.resolve_accessible_tree(ctx.identity()).await {
        Ok(tree) => (StatusCode::OK, Json(tree)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /menus/users/me/buttons/:action_key/check
pub async fn check_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(key): Path<String>,
) -> axum::response::Response {
    match services
        .resolver
        .check_action_permission(ctx.identity(), &ActionKey::new(key))
        .await
    {
        Ok(allowed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "has_permission": allowed })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /menus/users/me/buttons/:action_key/explain - why a check passed or failed.
pub async fn explain_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(key): Path<String>,
) -> axum::response::Response {
    match services
        .resolver
        .explain_action_permission(ctx.identity(), &ActionKey::new(key))
        .await
    {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /menus/users/me/nodes/:id/buttons
pub async fn node_actions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: NodeId = match errors::parse_id(&id, "menu node") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.resolver.resolve_node_actions(ctx.identity(), id).await {
        Ok(actions) => (StatusCode::OK, Json(actions)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

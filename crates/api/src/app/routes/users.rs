//! Per-user grant administration (superuser only).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use navgate_core::UserId;

use crate::app::{dto, errors, services::AppServices};
use crate::context::IdentityContext;

pub fn router() -> Router {
    Router::new()
        .route(
            "/menus/users/:user_id/menus",
            get(preview_user_tree).post(set_node_grants),
        )
        .route(
            "/menus/users/:user_id/buttons",
            get(get_action_grants).post(set_action_grants),
        )
        .route("/menus/users/:user_id/grants", get(get_user_grants))
}

fn parse_user(raw: &str) -> Result<UserId, axum::response::Response> {
    errors::parse_id(raw, "user")
}

/// GET /menus/users/:user_id/menus - the tree that user would see.
pub async fn preview_user_tree(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user = match parse_user(&user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.admin.preview_user_tree(ctx.identity(), user).await {
        Ok(tree) => (StatusCode::OK, Json(tree)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /menus/users/:user_id/menus - replace the user's node grants.
pub async fn set_node_grants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(user_id): Path<String>,
    Json(body): Json<dto::SetNodeGrantsRequest>,
) -> axum::response::Response {
    let user = match parse_user(&user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .admin
        .set_user_node_grants(ctx.identity(), user, body.menu_permissions)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "menu permissions updated" })),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// GET /menus/users/:user_id/buttons - the user's action grants as stored.
pub async fn get_action_grants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user = match parse_user(&user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.admin.get_user_grants(ctx.identity(), user).await {
        Ok(grants) => (StatusCode::OK, Json(grants.action_grants)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /menus/users/:user_id/buttons - replace the user's action grants.
pub async fn set_action_grants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(user_id): Path<String>,
    Json(body): Json<dto::SetActionGrantsRequest>,
) -> axum::response::Response {
    let user = match parse_user(&user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .admin
        .set_user_action_grants(ctx.identity(), user, body.button_permissions)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "button permissions updated" })),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// GET /menus/users/:user_id/grants - both grant sets as stored.
pub async fn get_user_grants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user = match parse_user(&user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.admin.get_user_grants(ctx.identity(), user).await {
        Ok(grants) => (StatusCode::OK, Json(grants)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

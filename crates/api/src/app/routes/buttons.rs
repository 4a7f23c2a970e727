//! Action ("button") administration (superuser only).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use navgate_core::{ActionKey, NewAction};

use crate::app::{dto, errors, services::AppServices};
use crate::context::IdentityContext;

pub fn router() -> Router {
    Router::new()
        .route("/menus/buttons", get(list_actions).post(create_action))
        .route("/menus/buttons/:action_key", get(get_action).delete(delete_action))
}

/// GET /menus/buttons?menu_item_id
pub async fn list_actions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Query(query): Query<dto::ListActionsQuery>,
) -> axum::response::Response {
    match services
        .admin
        .list_actions(ctx.identity(), query.menu_item_id)
        .await
    {
        Ok(actions) => (StatusCode::OK, Json(actions)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

pub async fn create_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Json(body): Json<NewAction>,
) -> axum::response::Response {
    match services.admin.create_action(ctx.identity(), body).await {
        Ok(action) => (StatusCode::CREATED, Json(action)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

pub async fn get_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(key): Path<String>,
) -> axum::response::Response {
    match services
        .admin
        .get_action(ctx.identity(), &ActionKey::new(key))
        .await
    {
        Ok(action) => (StatusCode::OK, Json(action)).into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

pub async fn delete_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<IdentityContext>,
    Path(key): Path<String>,
) -> axum::response::Response {
    match services
        .admin
        .delete_action(ctx.identity(), &ActionKey::new(key))
        .await
    {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "action deleted" })),
        )
            .into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "action not found"),
        Err(e) => errors::admin_error_to_response(e),
    }
}

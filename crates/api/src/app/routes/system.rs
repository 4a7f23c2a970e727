use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::IdentityContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<IdentityContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": ctx.user_id().to_string(),
        "is_superuser": ctx.is_superuser(),
    }))
}

use axum::{Router, routing::get};

pub mod buttons;
pub mod me;
pub mod menus;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(menus::router())
        .merge(buttons::router())
        .merge(me::router())
        .merge(users::router())
}

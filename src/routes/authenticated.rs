use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Protected Router Module
///
/// Item mutations. The whole router is wrapped in the `require_admin` route
/// layer, so an anonymous request is redirected to the login page before any
/// of these handlers runs. Each handler additionally takes `AdminSession`, which
/// keeps it safe if mounted elsewhere by mistake.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /create
        .route(
            "/create",
            get(handlers::create_form).post(handlers::create_item),
        )
        // GET/POST /edit/{id}
        // 404 when the item does not exist.
        .route(
            "/edit/{id}",
            get(handlers::edit_form).post(handlers::update_item),
        )
        // POST /delete/{id}
        .route("/delete/{id}", post(handlers::delete_item))
}

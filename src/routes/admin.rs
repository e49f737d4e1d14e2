use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Account Router Module
///
/// Registration, login and logout, nested under `/admin`. These routes are not
/// gated; each handler validates its own input instead.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/register
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        // GET/POST /admin/login
        // Establishes the session cookie on success.
        .route("/login", get(handlers::login_form).post(handlers::login))
        // GET /admin/logout
        // Clears the session cookie; harmless when there is none.
        .route("/logout", get(handlers::logout))
}

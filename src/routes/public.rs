use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints accessible to any client, anonymous or logged in. None of these
/// handlers mutate state.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
        // GET /?page=N
        // Newest-first item listing, six per page.
        .route("/", get(handlers::list_items))
        // GET /item/{id}
        // Item detail, or the 404 view.
        .route("/item/{id}", get(handlers::item_detail))
}

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod items;
pub mod models;
pub mod repository;
pub mod views;

// Module for routing segregation (Public, Admin account, Protected).
pub mod routes;
use auth::{AdminSession, SessionManager};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use credentials::CredentialStore;
pub use items::ItemStore;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// AppState
///
/// The single, cloneable container shared by every request: the persistence
/// layer, the two stores built on it, the session signer and the configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: database access behind `Arc<dyn Repository>`.
    pub repo: RepositoryState,
    /// Admin registration and password checks.
    pub credentials: CredentialStore,
    /// Item lifecycle and listing.
    pub items: ItemStore,
    /// Issues and validates session and flash tokens.
    pub sessions: SessionManager,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the stores and the session manager around one repository.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            credentials: CredentialStore::new(repo.clone()),
            items: ItemStore::new(repo.clone()),
            sessions: SessionManager::from_config(&config),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(app_state: &AppState) -> SessionManager {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_admin
///
/// The authorization gate for the protected routes.
///
/// *Mechanism*: extracting `AdminSession` resolves the session cookie. Without a
/// valid admin session the extractor rejects with `AppError::Unauthorized`,
/// which redirects to the login page with a notice; the wrapped handler never
/// runs.
async fn require_admin(_admin: AdminSession, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Public Routes: No gate applied.
        .merge(public::public_routes())
        // Account Routes: login must be reachable while anonymous.
        .nest("/admin", admin::admin_routes())
        // Protected Routes: every request passes `require_admin` first.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin,
            )),
        )
        .fallback(handlers::not_found)
        // Notices survive redirects through the flash cookie.
        .layer(middleware::from_fn_with_state(state.clone(), flash::carry_flash))
        .with_state(state);

    // Observability and Correlation Layers (Applied outermost)
    base_router.layer(
        ServiceBuilder::new()
            // Request ID Generation: a UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // Request Tracing: one span per request, tagged with the request ID.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // Request ID Propagation: echo x-request-id back to the client.
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, carrying the method, URI
/// and `x-request-id` so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

//! Ledger Web Server
//!
//! HTTP service for a multi-user work ledger: token authentication, role
//! gated routes, ownership checks on entry mutations, export and an audit
//! trail.

pub mod activity;
pub mod auth;
pub mod database;
pub mod error;
pub mod export;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;
pub mod suggestions;

// Re-export main types
pub use database::Database;
pub use error::{ApiError, ApiResult};
pub use server::{LedgerServer, LedgerServerBuilder};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Build the CORS layer from configured origins; `*` admits any origin
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    if origins.iter().any(|origin| origin.trim() == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed).allow_credentials(true)
}

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let mut app = Router::new().nest("/api", routes::api_routes(&state.jwt));
    if state.config.server.debug {
        app = app.layer(axum::middleware::from_fn(middleware::expose_error_details));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB max body size
        .with_state(state)
}

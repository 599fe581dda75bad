//! Axum router configuration with middleware.
//!
//! Bot routes live under `/v1/`. Reads need the `read` scope, mutations the
//! `write` scope; `/health` is open.
//! Middleware: API key auth (per route), request ids, CORS, tracing.

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::extractors::auth::{require_read, require_write};
use crate::http::extractors::context::assign_request_id;
use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let reads = get(handlers::bot::get_bot)
        .route_layer(from_fn_with_state(state.clone(), require_read));
    let writes = post(handlers::bot::create_bot)
        .patch(handlers::bot::update_bot)
        .delete(handlers::bot::delete_bot)
        .route_layer(from_fn_with_state(state.clone(), require_write));

    let api_routes = Router::new().route("/bot", reads.merge(writes));

    Router::new()
        .nest("/v1", api_routes)
        .route("/health", get(health_check))
        .layer(from_fn(assign_request_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

//! API key authentication middleware.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are resolved through the API key store to a [`Principal`], which is
//! checked against the route's scope and stored in request extensions for
//! the [`Caller`](super::context::Caller) extractor.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use botmanager_types::identity::Scope;

use crate::http::error::AppError;
use crate::state::AppState;

/// Middleware for routes that need the `read` scope.
pub async fn require_read(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, Scope::Read).await
}

/// Middleware for routes that need the `write` scope.
pub async fn require_write(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, Scope::Write).await
}

async fn authorize(
    state: &AppState,
    mut req: Request,
    next: Next,
    scope: Scope,
) -> Result<Response, AppError> {
    let api_key = extract_api_key(req.headers())?;

    let principal = state
        .api_keys
        .resolve(&api_key)
        .await
        .map_err(|e| AppError::Internal(format!("Database error: {e}")))?
        .ok_or_else(|| {
            AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            )
        })?;

    if !principal.allows(scope) {
        tracing::debug!(owner = %principal.owner, %scope, "API key lacks scope");
        return Err(AppError::Forbidden(format!(
            "API key does not grant the '{scope}' scope"
        )));
    }

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Extract the API key from request headers.
fn extract_api_key(headers: &HeaderMap) -> Result<String, AppError> {
    // Try Authorization: Bearer <key>
    if let Some(auth) = headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(key) = headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

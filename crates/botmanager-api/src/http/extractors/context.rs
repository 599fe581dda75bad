//! Builds the per-request [`RequestContext`] handed to the bot service, and
//! the layer that assigns every request its id.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::HeaderValue;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use botmanager_core::context::RequestContext;
use botmanager_types::identity::Principal;

use crate::http::error::ErrorParts;
use crate::state::AppState;

/// Id assigned to a request before auth runs.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Assign a request id, echo it as `x-request-id`, and stamp it into error
/// envelopes so failures can be matched to the operation's span.
pub async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let id = Uuid::now_v7();
    req.extensions_mut().insert(RequestId(id));

    let mut response = next.run(req).await;
    if let Some(parts) = response.extensions_mut().remove::<ErrorParts>() {
        response = parts.render(id.to_string());
    }
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// The caller's request context: principal from the auth layer plus the
/// configured request deadline.
///
/// Extraction never fails. A route without the auth layer yields a context
/// with no principal, which the core rejects as unauthenticated.
pub struct Caller(pub RequestContext);

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map_or_else(Uuid::now_v7, |id| id.0);
        let ctx = RequestContext::new(request_id)
            .with_timeout(state.config.request_timeout());

        let ctx = match parts.extensions.get::<Principal>() {
            Some(principal) => ctx.with_principal(principal.clone()),
            None => {
                tracing::error!(
                    path = %parts.uri.path(),
                    "no principal on request, auth layer missing from route"
                );
                ctx
            }
        };

        Ok(Caller(ctx))
    }
}

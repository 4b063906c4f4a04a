//! Session middleware.
//! Resolves the bearer token to a principal and attaches it to the request.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};

use crate::domain::Principal;
use crate::http::registrar::{layer, RouteLayer};
use crate::http::response::ApiError;
use crate::service::AuthService;

/// State of [`session_middleware`].
#[derive(Clone)]
pub struct SessionGate {
    auth: Arc<AuthService>,
    /// When false every request passes without a principal.
    enforce: bool,
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn session_middleware(
    State(gate): State<SessionGate>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !gate.enforce {
        return next.run(req).await;
    }

    let Some(token) = bearer_token(&req).map(str::to_string) else {
        return (StatusCode::UNAUTHORIZED, "Missing bearer token").into_response();
    };

    match gate.auth.authenticate(&token).await {
        Ok(Some(principal)) => {
            tracing::debug!(email = %principal.email, "Request authenticated");
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Ok(None) => (StatusCode::UNAUTHORIZED, "Session expired or unknown").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Require a live session. When `enforce` is false every request passes.
pub fn require_session(auth: Arc<AuthService>, enforce: bool) -> RouteLayer {
    layer(from_fn_with_state(SessionGate { auth, enforce }, session_middleware))
}

/// Rejects principals whose role differs from the required one.
///
/// Passes through when no principal is attached, which only happens with auth
/// enforcement turned off.
pub async fn role_middleware(
    State(role): State<&'static str>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let denied = req
        .extensions()
        .get::<Principal>()
        .filter(|p| p.role != role)
        .map(|p| p.email.clone());
    if let Some(email) = denied {
        tracing::warn!(%email, required = role, "Role check failed");
        return (StatusCode::FORBIDDEN, "Insufficient role").into_response();
    }
    next.run(req).await
}

/// Require the principal attached by [`require_session`] to hold `role`.
pub fn require_role(role: &'static str) -> RouteLayer {
    layer(from_fn_with_state(role, role_middleware))
}

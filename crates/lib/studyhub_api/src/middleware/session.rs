//! Session extraction: turns the caller's bearer token or access cookie into
//! an explicit [`SessionContext`].
//!
//! Nothing is verified here. Whether the token names a live admin session is
//! decided by the gate, per request.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::CookieJar;

use studyhub_core::auth::SessionContext;

use crate::services::cookies::ACCESS_COOKIE;

/// Axum middleware: injects the caller's `SessionContext` into request
/// extensions. The `Authorization` header wins over the cookie.
pub async fn session_context(mut request: Request, next: Next) -> Response {
    let ctx = context_from_headers(request.headers());
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

pub fn context_from_headers(headers: &HeaderMap) -> SessionContext {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return SessionContext::bearer(token);
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_COOKIE)
        .map(|c| SessionContext::bearer(c.value()))
        .unwrap_or_default()
}

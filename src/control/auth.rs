//! # API-key guard for the control plane.
//!
//! Installed by [`router`](super::router) only when `server.api_key` is set.
//!
//! ```text
//! request ──► public path (/, /id)? ── yes ──► handler
//!                    │ no
//!                    ▼
//!             Authorization: Bearer <key> | <key>
//!             X-API-Key: <key>           ── match ──► handler
//!                    │ none matches
//!                    ▼
//!             401 {success: false, message: "Unauthorized."}
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::envelope::Envelope;

/// Paths reachable without a key.
const PUBLIC_PATHS: &[&str] = &["/", "/id"];

/// Rejects requests that carry neither `Authorization: Bearer <key>` (or a
/// bare key) nor `X-API-Key: <key>` matching the configured key.
pub(crate) async fn require_api_key(
    State(expected): State<Arc<str>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    if [bearer, api_key].into_iter().flatten().any(|k| k == &*expected) {
        return next.run(request).await;
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(Envelope::<()>::fail("Unauthorized.")),
    )
        .into_response()
}

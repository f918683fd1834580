//! # HTTP control plane.
//!
//! Thin axum surface over a [`SchedulerHandle`]. Every response uses the
//! shared [`Envelope`](crate::Envelope) shape.
//!
//! ```text
//! GET  /              service identification (public)
//! GET  /id            service identification (public)
//! GET  /mode/get      {mode: string|null}
//! GET  /mode/get_all  [string]
//! GET  /mode/queue    scheduler snapshot
//! POST /mode/queue    {mode, priority?} → 200 | 400 {success: false, message}
//! ```
//!
//! When `server.api_key` is configured, every non-public route requires
//! `Authorization: Bearer <key>` or `X-API-Key: <key>` (401 otherwise).

mod auth;
mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::core::SchedulerHandle;
use crate::error::RuntimeError;

#[derive(Clone)]
pub(crate) struct ControlState {
    handle: SchedulerHandle,
    service_id: Arc<str>,
}

/// Builds the control-plane router.
pub fn router(handle: SchedulerHandle, server: &ServerConfig) -> Router {
    let state = ControlState {
        handle,
        service_id: Arc::from(server.service_id.as_str()),
    };

    let mut app = Router::new()
        .route("/", get(routes::identify))
        .route("/id", get(routes::identify))
        .route("/mode/get", get(routes::get_mode))
        .route("/mode/get_all", get(routes::get_all))
        .route(
            "/mode/queue",
            get(routes::queue_snapshot).post(routes::queue_mode),
        )
        .with_state(state);

    if let Some(key) = server.api_key.as_deref() {
        app = app.layer(middleware::from_fn_with_state(
            Arc::<str>::from(key),
            auth::require_api_key,
        ));
    }
    app.layer(TraceLayer::new_for_http())
}

/// Serves `app` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), RuntimeError> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

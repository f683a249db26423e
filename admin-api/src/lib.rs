//! Jobs Admin API
//!
//! Exposes the worker health endpoint and the job history read/affordance
//! routes. Workspace-membership authorization is enforced upstream by the
//! API gateway; this service is internal.

use std::{future::Future, net::SocketAddr};

use axum::{
    Router,
    routing::{get, post},
};
use common::BoxResult;

mod ctx;
pub mod handlers;

pub use ctx::Ctx;
use handlers::{health, jobs};

pub async fn serve(
    at: SocketAddr,
    ctx: Ctx,
) -> BoxResult<(SocketAddr, impl Future<Output = BoxResult<()>>)> {
    http_common::serve_at(at, router(ctx)).await
}

/// Builds the service router. Split out of [`serve`] so tests can drive the
/// routes without binding a socket.
pub fn router(ctx: Ctx) -> Router {
    Router::new()
        .route("/health/jobs", get(health::handler))
        .route("/jobs", get(jobs::get_all::handler))
        .route("/jobs/{id}", get(jobs::get_by_id::handler))
        .route("/jobs/{id}/cancel", post(jobs::cancel::handler))
        .route("/jobs/{id}/retry", post(jobs::retry::handler))
        .with_state(ctx)
}

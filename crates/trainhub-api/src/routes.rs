//! API routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, jobs, metrics};
use crate::state::AppState;

/// Create the admin router. Serve it on a private interface only.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness));

    let job_routes = Router::new()
        .route("/scheduled-emails/run", post(jobs::run_scheduled_emails))
        .route("/simulation-launches/run", post(jobs::run_simulation_launches))
        .route("/cleanup/run", post(jobs::run_cleanup));

    Router::new()
        .nest("/health", health_routes)
        .nest("/admin/jobs", job_routes)
        .route("/metrics", get(metrics::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

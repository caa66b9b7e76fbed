//! Prometheus scrape endpoint

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.encode()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

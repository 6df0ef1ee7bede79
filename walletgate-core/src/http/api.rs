//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};

/// Build the broker router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(handlers::auth))
        .route("/signin", get(handlers::signin))
        .with_state(state)
}

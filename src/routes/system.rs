use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Operational endpoints used by load balancers and monitoring.
pub fn system_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

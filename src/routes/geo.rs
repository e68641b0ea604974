use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Geo Router Module
pub fn geo_routes() -> Router<AppState> {
    // GET /api/geo/routes/{id}/geom
    Router::new().route("/routes/{id}/geom", get(handlers::route_geometry))
}

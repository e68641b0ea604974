use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{MethodRouter, get},
};

/// Route Router Module
///
/// Reads under `/api/routes` are open to anonymous callers; what they see depends on the
/// optional identity. Writes need an identity and pass the ownership check in the service.
///
/// Paths are absolute and the router is merged, not nested: a nested `/` only answers the
/// bare prefix, and clients call the collection both with and without the trailing slash.
pub fn route_routes() -> Router<AppState> {
    Router::new()
        // GET  /api/routes?page=&size=   public listing
        // POST /api/routes               create, caller becomes owner
        .route("/api/routes", collection())
        .route("/api/routes/", collection())
        // GET /api/routes/mine
        // The static segment takes priority over `/{id}`.
        .route("/api/routes/mine", get(handlers::my_routes))
        // GET/PUT/DELETE /api/routes/{id}
        .route(
            "/api/routes/{id}",
            get(handlers::route_details)
                .put(handlers::update_route)
                .delete(handlers::delete_route),
        )
}

fn collection() -> MethodRouter<AppState> {
    get(handlers::list_routes).post(handlers::create_route)
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Auth Router Module
///
/// Login and register are open and never inspect tokens. `/me` is open as well; the
/// handler answers 401 itself when the request carries no identity.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/register
        .route("/register", post(handlers::register))
        // POST /api/auth/login
        .route("/login", post(handlers::login))
        // GET /api/auth/me
        .route("/me", get(handlers::whoami))
}

/// Registration and login on top of the storage and password-hash capabilities.
pub mod auth;

/// Route CRUD with ownership and geometry visibility applied per caller.
pub mod routes;

pub use auth::AuthService;
pub use routes::RouteService;

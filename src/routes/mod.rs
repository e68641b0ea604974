/// Router Module Index
///
/// One router per API area. Access control is not attached here: the authentication and
/// authorization middleware in `create_router` apply the route table to every request,
/// so a router only declares paths and handlers.

/// `/api/auth/*`: registration, login and whoami.
pub mod auth;

/// `/api/routes/*`: route CRUD and listings.
pub mod route;

/// `/api/geo/*`: geometry lookups.
pub mod geo;

/// `/health`.
pub mod system;

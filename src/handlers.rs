use crate::{
    auth::{Identity, MaybeIdentity},
    error::{ApiError, ErrorBody},
    models::{
        AuthResponse, GeometryResponse, LoginRequest, RegisterRequest, RouteCreateRequest,
        RoutePage, RouteResponse, RouteUpdateRequest, WhoAmIResponse,
    },
    repository::RepositoryState,
    services::{AuthService, RouteService, routes::DEFAULT_PAGE_SIZE},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

// --- Query Structs ---

/// PageQuery
///
/// Pagination parameters for the public route listing (GET /api/routes).
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// Zero-based page index. Defaults to 0.
    #[serde(default)]
    pub page: u32,
    /// Page size, clamped to 1..=100. Defaults to 20.
    #[serde(default = "default_page_size")]
    pub size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates an account and returns a session token for it.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = AuthResponse),
        (status = 400, description = "Missing fields or unknown role", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    auth.register(payload).await.map(Json)
}

/// login
///
/// [Public Route] Exchanges credentials for a session token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    auth.login(payload).await.map(Json)
}

/// whoami
///
/// [Public Route] Reports the identity attached to the current request.
/// The route itself is open; an anonymous caller gets a 401 from here.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current identity", body = WhoAmIResponse),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn whoami(identity: MaybeIdentity) -> Result<Json<WhoAmIResponse>, ApiError> {
    let Some(identity) = identity.0 else {
        return Err(ApiError::Unauthorized("Unauthenticated".to_string()));
    };
    Ok(Json(WhoAmIResponse {
        email: identity.subject,
        role: identity.role,
    }))
}

// --- Route Handlers ---

/// list_routes
///
/// [Public Route] Paginated public routes, newest first. Geometry is omitted from listings.
#[utoipa::path(
    get,
    path = "/api/routes",
    params(PageQuery),
    responses((status = 200, description = "Public routes", body = RoutePage))
)]
pub async fn list_routes(
    viewer: MaybeIdentity,
    State(routes): State<RouteService>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RoutePage>, ApiError> {
    routes
        .list_public(viewer.identity(), query.page, query.size)
        .await
        .map(Json)
}

/// create_route
///
/// [Authenticated Route] Stores a new route owned by the caller.
#[utoipa::path(
    post,
    path = "/api/routes",
    request_body = RouteCreateRequest,
    responses(
        (status = 201, description = "Created", body = RouteResponse),
        (status = 400, description = "Validation failed or invalid WKT", body = ErrorBody),
        (status = 401, description = "Authentication required", body = ErrorBody)
    )
)]
pub async fn create_route(
    identity: Identity,
    State(routes): State<RouteService>,
    Json(payload): Json<RouteCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = routes.create(&identity, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// my_routes
///
/// [Authenticated Route] Every route owned by the caller, public or private.
#[utoipa::path(
    get,
    path = "/api/routes/mine",
    responses(
        (status = 200, description = "My routes", body = [RouteResponse]),
        (status = 401, description = "Authentication required", body = ErrorBody)
    )
)]
pub async fn my_routes(
    identity: Identity,
    State(routes): State<RouteService>,
) -> Result<Json<Vec<RouteResponse>>, ApiError> {
    routes.mine(&identity).await.map(Json)
}

/// route_details
///
/// [Public Route] A single route. The geometry is only included for public routes or
/// when the caller owns the route.
#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 200, description = "Route", body = RouteResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn route_details(
    viewer: MaybeIdentity,
    State(routes): State<RouteService>,
    Path(id): Path<i64>,
) -> Result<Json<RouteResponse>, ApiError> {
    routes.get_for_viewer(id, viewer.identity()).await.map(Json)
}

/// update_route
///
/// [Authenticated Route] Partial update. Owner only.
#[utoipa::path(
    put,
    path = "/api/routes/{id}",
    params(("id" = i64, Path, description = "Route id")),
    request_body = RouteUpdateRequest,
    responses(
        (status = 200, description = "Updated", body = RouteResponse),
        (status = 400, description = "Invalid field or WKT", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_route(
    identity: Identity,
    State(routes): State<RouteService>,
    Path(id): Path<i64>,
    Json(payload): Json<RouteUpdateRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    routes.update(id, payload, &identity).await.map(Json)
}

/// delete_route
///
/// [Authenticated Route] Removes a route. Owner only.
#[utoipa::path(
    delete,
    path = "/api/routes/{id}",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_route(
    identity: Identity,
    State(routes): State<RouteService>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    routes.delete(id, &identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// route_geometry
///
/// [Authenticated Route] The route's line as WKT, under the same visibility rule as the
/// details view.
#[utoipa::path(
    get,
    path = "/api/geo/routes/{id}/geom",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 200, description = "Geometry", body = GeometryResponse),
        (status = 403, description = "Geometry not visible", body = ErrorBody),
        (status = 404, description = "Route or geometry not found", body = ErrorBody)
    )
)]
pub async fn route_geometry(
    identity: Identity,
    State(routes): State<RouteService>,
    Path(id): Path<i64>,
) -> Result<Json<GeometryResponse>, ApiError> {
    routes
        .geometry_for_viewer(id, Some(&identity))
        .await
        .map(Json)
}

// --- Health ---

/// health
///
/// [Public Route] Liveness plus a database round trip.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Healthy", body = String),
        (status = 503, description = "Database unreachable", body = String)
    )
)]
pub async fn health(State(repo): State<RepositoryState>) -> (StatusCode, &'static str) {
    match repo.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "health probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}

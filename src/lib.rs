use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header, request::Parts},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod geometry;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;

// One router per API area.
pub mod routes;
use routes::{auth::auth_routes, geo::geo_routes, route::route_routes, system::system_routes};

// --- Public Re-exports ---

pub use auth::{
    Argon2PasswordEncoder, Identity, MaybeIdentity, PasswordState, TokenCodec, TokenState,
};
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use services::{AuthService, RouteService};

/// ApiDoc
///
/// Auto-generates the OpenAPI document from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`, browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::whoami,
        handlers::list_routes, handlers::create_route, handlers::my_routes,
        handlers::route_details, handlers::update_route, handlers::delete_route,
        handlers::route_geometry, handlers::health
    ),
    components(
        schemas(
            models::Role, models::RegisterRequest, models::LoginRequest, models::AuthResponse,
            models::WhoAmIResponse, models::RouteCreateRequest, models::RouteUpdateRequest,
            models::RouteResponse, models::RoutePage, models::GeometryResponse,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "orienteering", description = "Orienteering Routes API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container for the application's capabilities. Everything in it is
/// immutable after startup; handlers pull the parts they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Session token signing and verification, built once from the configured secret.
    pub tokens: TokenState,
    /// Password hashing capability.
    pub passwords: PasswordState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for PasswordState {
    fn from_ref(app_state: &AppState) -> PasswordState {
        app_state.passwords.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(app_state: &AppState) -> AuthService {
        AuthService::new(
            app_state.repo.clone(),
            app_state.passwords.clone(),
            app_state.tokens.clone(),
        )
    }
}

impl FromRef<AppState> for RouteService {
    fn from_ref(app_state: &AppState) -> RouteService {
        RouteService::new(app_state.repo.clone())
    }
}

/// create_router
///
/// Assembles every router, then wraps them (innermost first) in:
/// 1. `authorize`: the route access table, 401 for anonymous calls to protected routes.
/// 2. `authenticate`: bearer token to request-scoped `Identity`.
/// 3. Request id and tracing.
/// 4. CORS, outermost, so preflights are answered before anything else runs.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let tokens = state.tokens.clone();

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(system_routes())
        .nest("/api/auth", auth_routes())
        .merge(route_routes())
        .nest("/api/geo", geo_routes())
        .with_state(state);

    base_router
        .layer(middleware::from_fn(auth::middleware::authorize))
        .layer(middleware::from_fn_with_state(
            tokens,
            auth::middleware::authenticate,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// cors_layer
///
/// Credentials are allowed, so origins cannot be a wildcard: either the configured list or,
/// when none is configured, any `localhost`/`127.0.0.1` origin on any port. Request headers
/// are mirrored; `Authorization` and `Content-Type` are exposed to the browser.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = if config.cors_origins.is_empty() {
        AllowOrigin::predicate(|origin: &HeaderValue, _: &Parts| {
            origin.to_str().is_ok_and(is_local_origin)
        })
    } else {
        AllowOrigin::list(
            config
                .cors_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// `http(s)://localhost[:port]` or `http(s)://127.0.0.1[:port]`.
pub fn is_local_origin(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };

    ["localhost", "127.0.0.1"].iter().any(|host| {
        rest.strip_prefix(host)
            .is_some_and(|tail| tail.is_empty() || tail.starts_with(':'))
    })
}

/// trace_span_logger
///
/// Builds the per-request span, tagged with the `x-request-id` so every log line for one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

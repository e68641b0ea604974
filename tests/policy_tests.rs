use axum::http::{HeaderMap, HeaderValue, Method, header};
use chrono::{Duration, Utc};
use orienteering_api::{
    auth::{
        Identity, Requirement, RouteMatcher, TokenCodec, can_edit, ensure_can_edit,
        include_geometry,
        middleware::{bearer_token, resolve_identity},
    },
    error::ApiError,
    models::Role,
};

const SECRET: &[u8] = b"policy-test-secret-0123456789abcdefghij";

fn codec() -> TokenCodec {
    TokenCodec::new(SECRET, Duration::hours(1))
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

// --- Route access table ---

#[test]
fn test_public_routes_need_no_identity() {
    let matcher = RouteMatcher::default();
    let public = [
        (Method::GET, "/health"),
        (Method::GET, "/swagger-ui"),
        (Method::GET, "/swagger-ui/index.html"),
        (Method::GET, "/api-docs/openapi.json"),
        (Method::POST, "/api/auth/login"),
        (Method::POST, "/api/auth/register"),
        (Method::GET, "/api/auth/me"),
        (Method::GET, "/api/routes"),
        (Method::GET, "/api/routes/42"),
        (Method::GET, "/api/routes/mine"),
        (Method::OPTIONS, "/api/routes/42"),
        (Method::OPTIONS, "/anything/at/all"),
    ];

    for (method, path) in public {
        assert_eq!(
            matcher.requirement(&method, path),
            Requirement::Public,
            "{} {} should be public",
            method,
            path
        );
    }
}

#[test]
fn test_everything_else_requires_identity() {
    let matcher = RouteMatcher::default();
    let protected = [
        (Method::POST, "/api/routes"),
        (Method::PUT, "/api/routes/42"),
        (Method::DELETE, "/api/routes/42"),
        (Method::GET, "/api/geo/routes/42/geom"),
        (Method::GET, "/api/auth/login"),
        (Method::DELETE, "/api/auth/me"),
        // Prefix without a path boundary is not part of the public subtree.
        (Method::GET, "/api/routesXYZ"),
        (Method::GET, "/unknown"),
    ];

    for (method, path) in protected {
        assert_eq!(
            matcher.requirement(&method, path),
            Requirement::Authenticated,
            "{} {} should require an identity",
            method,
            path
        );
    }
}

// --- Authentication decision ---

#[test]
fn test_bearer_token_extraction() {
    assert_eq!(bearer_token(&bearer("abc.def.ghi")), Some("abc.def.ghi"));

    let mut basic = HeaderMap::new();
    basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
    assert_eq!(bearer_token(&basic), None);

    assert_eq!(bearer_token(&HeaderMap::new()), None);
}

#[test]
fn test_valid_token_yields_identity() {
    let codec = codec();
    let token = codec
        .issue_default("runner@example.com", Some(Role::User))
        .unwrap();

    let identity = resolve_identity(
        &codec,
        &Method::GET,
        "/api/routes/mine",
        &bearer(token.as_str()),
    );
    assert_eq!(
        identity,
        Some(Identity::new("runner@example.com", Some(Role::User)))
    );
}

#[test]
fn test_invalid_or_expired_token_degrades_to_anonymous() {
    let codec = codec();
    let expired = codec
        .issue_at(
            "runner@example.com",
            None,
            Duration::milliseconds(1),
            Utc::now() - Duration::hours(2),
        )
        .unwrap();

    for token in [expired.as_str(), "garbage", ""] {
        let identity = resolve_identity(&codec, &Method::GET, "/api/routes", &bearer(token));
        assert_eq!(identity, None);
    }
}

#[test]
fn test_empty_subject_is_not_an_identity() {
    let codec = codec();
    let token = codec.issue_default("", Some(Role::User)).unwrap();
    let identity = resolve_identity(&codec, &Method::GET, "/api/routes", &bearer(token.as_str()));
    assert_eq!(identity, None);
}

#[test]
fn test_preflight_and_credential_endpoints_skip_token_processing() {
    let codec = codec();
    let token = codec
        .issue_default("runner@example.com", Some(Role::User))
        .unwrap();
    let headers = bearer(token.as_str());

    assert_eq!(
        resolve_identity(&codec, &Method::OPTIONS, "/api/routes/1", &headers),
        None
    );
    assert_eq!(
        resolve_identity(&codec, &Method::POST, "/api/auth/login", &headers),
        None
    );
    assert_eq!(
        resolve_identity(&codec, &Method::POST, "/api/auth/register", &headers),
        None
    );
}

// --- Ownership and visibility ---

#[test]
fn test_ownership_is_case_insensitive() {
    assert!(can_edit("Runner@Example.com", Some("runner@example.com")));
    assert!(!can_edit("runner@example.com", Some("someone@example.com")));
    assert!(!can_edit("runner@example.com", Some("")));
    assert!(!can_edit("runner@example.com", None));
}

#[test]
fn test_non_owner_is_forbidden_not_unauthorized() {
    let intruder = Identity::new("intruder@example.com", Some(Role::Admin));
    let result = ensure_can_edit("runner@example.com", &intruder);
    assert!(matches!(result, Err(ApiError::Forbidden(_))));

    let owner = Identity::new("RUNNER@example.com", None);
    assert!(ensure_can_edit("runner@example.com", &owner).is_ok());
}

#[test]
fn test_geometry_visibility_rule() {
    assert!(include_geometry(true, false));
    assert!(include_geometry(false, true));
    assert!(include_geometry(true, true));
    assert!(!include_geometry(false, false));
}

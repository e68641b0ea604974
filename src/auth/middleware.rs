use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{
    Identity, TokenCodec, TokenState,
    policy::{Requirement, RouteMatcher, is_credential_endpoint},
};
use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the raw token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}

/// resolve_identity
///
/// The authentication decision for one request, without side effects:
/// 1. Preflight requests and the login/register endpoints never look at tokens.
/// 2. No header, or a non-Bearer scheme, means anonymous.
/// 3. A token that fails verification (bad signature, expired) also means anonymous.
///    The failure is logged and swallowed; downstream authorization decides on 401.
pub fn resolve_identity(
    codec: &TokenCodec,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Option<Identity> {
    if method == Method::OPTIONS || is_credential_endpoint(path) {
        return None;
    }

    let token = bearer_token(headers)?;

    match codec.verify(token) {
        Ok(identity) if identity.subject.is_empty() => {
            tracing::debug!("ignoring bearer token with an empty subject");
            None
        }
        Ok(identity) => Some(identity),
        Err(reason) => {
            tracing::debug!(%reason, "ignoring rejected bearer token");
            None
        }
    }
}

/// authenticate
///
/// Establishes the request-scoped [`Identity`] from the bearer token, if there is one and
/// it verifies. Runs once per request and never fails the request itself. An identity that
/// is already present in the extensions is left untouched.
pub async fn authenticate(
    State(tokens): State<TokenState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Identity>().is_none() {
        let identity = resolve_identity(
            &tokens,
            request.method(),
            request.uri().path(),
            request.headers(),
        );
        if let Some(identity) = identity {
            tracing::debug!(subject = %identity.subject, "request authenticated");
            request.extensions_mut().insert(identity);
        }
    }

    next.run(request).await
}

/// authorize
///
/// Applies the route access table. A protected route reached without an identity is
/// answered with 401 before any handler runs.
pub async fn authorize(request: Request, next: Next) -> Response {
    let requirement = RouteMatcher::default().requirement(request.method(), request.uri().path());

    if requirement == Requirement::Authenticated && request.extensions().get::<Identity>().is_none()
    {
        tracing::debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "anonymous request to protected route"
        );
        return ApiError::Unauthorized("Authentication required".to_string()).into_response();
    }

    next.run(request).await
}

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, models::Role};

pub mod middleware;
pub mod ownership;
pub mod password;
pub mod policy;
pub mod token;

pub use ownership::{
    can_edit, ensure_can_edit, include_geometry, normalize_subject, same_subject,
};
pub use password::{Argon2PasswordEncoder, PasswordEncoder, PasswordError, PasswordState};
pub use policy::{Requirement, RouteMatcher};
pub use token::{Claims, Token, TokenCodec, TokenError, TokenState};

/// Identity
///
/// The authenticated caller for one request. It is produced only by a successful token
/// verification (in the authentication middleware) or by a successful login/registration,
/// and it lives in the request's extensions: nothing outside the request ever sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The token subject: the account email.
    pub subject: String,
    /// `None` means "no extra authority", never a default privileged role.
    pub role: Option<Role>,
}

impl Identity {
    pub fn new(subject: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    /// Granted authorities derived from the role claim (`ROLE_USER`, `ROLE_ADMIN`).
    pub fn authorities(&self) -> Vec<String> {
        self.role.iter().map(Role::authority).collect()
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.role.is_some_and(|role| role.authority() == authority)
    }
}

/// Identity Extractor Implementation
///
/// Reads the identity the authentication middleware stored in the request extensions.
/// Handlers that take an `Identity` argument therefore reject anonymous callers with
/// 401 even when the route table lets the request through.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// MaybeIdentity
///
/// The optional form of [`Identity`] for public handlers whose output depends on who is
/// asking (ownership flags, geometry visibility). Never rejects.
#[derive(Debug, Clone, Default)]
pub struct MaybeIdentity(pub Option<Identity>);

impl MaybeIdentity {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(parts.extensions.get::<Identity>().cloned()))
    }
}

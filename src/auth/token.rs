use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Identity;
use crate::{config::AppConfig, models::Role};

/// Claims
///
/// Payload of a session token. `iat` and `exp` are epoch **milliseconds**, so expiry is
/// exact for any TTL; the codec checks `exp` itself instead of relying on the library's
/// second-granularity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account email.
    pub sub: String,
    /// Optional role claim. Absent means no extra authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Issued At, epoch millis.
    pub iat: i64,
    /// Expiration, epoch millis. The token is expired once `now >= exp`.
    pub exp: i64,
}

/// Token
///
/// An opaque signed session credential. Never mutated after issuance; only re-verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// TokenError
///
/// Why a token was rejected. Both variants are absorbed by the authentication middleware
/// and degrade the request to anonymous; they are never rendered to the client directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Tampered bytes, wrong key, truncation, garbage, or undecodable claims.
    #[error("invalid token signature")]
    InvalidSignature,
    /// Signature valid, but `now >= exp`.
    #[error("token expired")]
    Expired,
}

/// TokenCodec
///
/// The process-wide signing context: an HS256 key pair derived from the configured secret
/// and the default TTL. Built once at startup and shared as [`TokenState`]; there is no
/// rotation and no revocation, a token stays valid until its natural expiry.
///
/// All operations are pure functions of (key, token/claims, clock) and safe to call from
/// any number of tasks concurrently.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

/// TokenState
///
/// The shared, immutable signing context stored in `AppState`.
pub type TokenState = Arc<TokenCodec>;

impl TokenCodec {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in verify_at against millisecond claims.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            default_ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::milliseconds(config.jwt_ttl_ms),
        )
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issues a token valid for `ttl` from now.
    pub fn issue(
        &self,
        subject: &str,
        role: Option<Role>,
        ttl: Duration,
    ) -> Result<Token, jsonwebtoken::errors::Error> {
        self.issue_at(subject, role, ttl, Utc::now())
    }

    /// Issues a token valid for the configured default TTL.
    pub fn issue_default(
        &self,
        subject: &str,
        role: Option<Role>,
    ) -> Result<Token, jsonwebtoken::errors::Error> {
        self.issue(subject, role, self.default_ttl)
    }

    /// issue_at
    ///
    /// Signs `{sub, role?, iat = now, exp = now + ttl}`. HS256 over identical claims is
    /// deterministic, so the same inputs and timestamp always give the same token.
    pub fn issue_at(
        &self,
        subject: &str,
        role: Option<Role>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Token, jsonwebtoken::errors::Error> {
        let iat = now.timestamp_millis();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat,
            exp: iat.saturating_add(ttl.num_milliseconds()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map(Token)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// verify_at
    ///
    /// Recomputes the MAC and compares it with the token's signature, then checks expiry
    /// against `now`. Nothing is cached: every call re-evaluates both.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let claims = self.decode_claims(token)?;
        if now.timestamp_millis() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(Identity::new(claims.sub, claims.role))
    }

    /// Signature-checked claims, without the expiry check.
    pub fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidSignature)
    }

    /// Best-effort subject lookup; `None` on any failure, including expiry.
    pub fn peek_subject(&self, token: &str) -> Option<String> {
        self.verify(token).ok().map(|identity| identity.subject)
    }

    /// Best-effort role lookup; `None` on any failure or when the claim is absent.
    pub fn peek_role(&self, token: &str) -> Option<Role> {
        self.verify(token).ok().and_then(|identity| identity.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            b"unit-test-secret-unit-test-secret-0123",
            Duration::hours(24),
        )
    }

    #[test]
    fn issue_is_deterministic_for_a_fixed_clock() {
        let codec = codec();
        let now = Utc::now();
        let a = codec.issue_at("a@x.com", Some(Role::User), Duration::minutes(5), now).unwrap();
        let b = codec.issue_at("a@x.com", Some(Role::User), Duration::minutes(5), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn claims_carry_millisecond_window() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at("a@x.com", None, Duration::milliseconds(1500), now).unwrap();
        let claims = codec.decode_claims(token.as_str()).unwrap();
        assert_eq!(claims.iat, now.timestamp_millis());
        assert_eq!(claims.exp, now.timestamp_millis() + 1500);
        assert_eq!(claims.role, None);
    }

    #[test]
    fn role_claim_is_omitted_when_absent() {
        let codec = codec();
        let token = codec.issue_default("a@x.com", None).unwrap();
        let payload = token.as_str().split('.').nth(1).unwrap().to_string();
        let with_role = codec.issue_default("a@x.com", Some(Role::Admin)).unwrap();
        let payload_with_role = with_role.as_str().split('.').nth(1).unwrap().to_string();
        assert!(payload.len() < payload_with_role.len());
        assert_eq!(codec.peek_role(with_role.as_str()), Some(Role::Admin));
        assert_eq!(codec.peek_role(token.as_str()), None);
    }
}

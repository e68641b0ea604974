use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Roles ---

/// Role
///
/// The closed set of account roles. Serialized in upper case (`"USER"`, `"ADMIN"`) both in
/// JSON and inside the token's `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    /// Lowest privilege; the default for self-registration.
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// The granted authority string derived from this role, e.g. `ROLE_ADMIN`.
    pub fn authority(&self) -> String {
        format!("ROLE_{}", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A registered account from the `users` table. The email doubles as the username and as
/// the subject of every token issued for this account.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    // Argon2 PHC string. Never the plaintext.
    #[sqlx(rename = "password")]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// Insert payload for `users`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Route
///
/// An orienteering route from the `routes` table. The geometry is carried as canonical WKT
/// (`ST_AsText` on the way out of PostGIS) and is `None` when the route has no line yet.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Route {
    pub id: i64,
    pub owner_username: String,
    pub name: String,
    pub distance_meters: Option<i32>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub geom_wkt: Option<String>,
}

/// Insert payload for `routes`. `geom_wkt` must already be validated.
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub owner_username: String,
    pub name: String,
    pub distance_meters: Option<i32>,
    pub is_public: bool,
    pub geom_wkt: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /api/auth/register`. Missing fields deserialize as empty strings
/// so the service can answer with a 400 instead of a framework rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Optional role name (`USER` or `ADMIN`, case-insensitive). Defaults to `USER`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// LoginRequest
///
/// Input payload for `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// RouteCreateRequest
///
/// Input payload for `POST /api/routes`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RouteCreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub distance_meters: i32,
    #[serde(rename = "public", default)]
    pub is_public: bool,
    /// LINESTRING WKT, optionally prefixed with `SRID=4326;`.
    #[serde(default)]
    #[schema(example = "LINESTRING (-6.26 53.34, -6.25 53.35)")]
    pub geom_wkt: String,
}

/// RouteUpdateRequest
///
/// Partial update payload for `PUT /api/routes/{id}`. Absent fields are left untouched;
/// a blank `geomWkt` removes the route's geometry.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RouteUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<i32>,

    #[serde(rename = "public", default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom_wkt: Option<String>,
}

// --- Response Payloads (Output Schemas) ---

/// AuthResponse
///
/// Returned by both register and login: the session token plus the identity it encodes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub email: String,
    pub role: Role,
}

/// Body of `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct WhoAmIResponse {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// RouteResponse
///
/// A route as seen by one particular viewer. `can_edit` and the presence of `geom_wkt` are
/// computed per request by the ownership and visibility rules; a hidden geometry is simply
/// omitted from the JSON.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RouteResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub distance_meters: Option<i32>,
    #[serde(rename = "public")]
    pub is_public: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom_wkt: Option<String>,
    pub owner_username: String,
    pub can_edit: bool,
}

/// RoutePage
///
/// One page of the public route listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoutePage {
    pub content: Vec<RouteResponse>,
    #[ts(type = "number")]
    pub total_elements: i64,
    #[ts(type = "number")]
    pub total_pages: i64,
    /// Zero-based page index.
    #[ts(type = "number")]
    pub number: i64,
    #[ts(type = "number")]
    pub size: i64,
}

/// Body of `GET /api/geo/routes/{id}/geom`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GeometryResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub wkt: String,
}

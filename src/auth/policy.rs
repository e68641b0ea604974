//! The route access table.
//!
//! An ordered list of (method, path pattern, requirement) rules. The first rule matching a
//! request decides; a request matching no rule requires an established identity.

use axum::http::Method;

pub const AUTH_LOGIN: &str = "/api/auth/login";
pub const AUTH_REGISTER: &str = "/api/auth/register";
pub const AUTH_WHOAMI: &str = "/api/auth/me";
pub const ROUTES_BASE: &str = "/api/routes";

/// What a request needs before it may reach a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodMatch {
    Any,
    Get,
    Post,
    Options,
}

impl MethodMatch {
    fn matches(&self, method: &Method) -> bool {
        match self {
            MethodMatch::Any => true,
            MethodMatch::Get => method == Method::GET,
            MethodMatch::Post => method == Method::POST,
            MethodMatch::Options => method == Method::OPTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    Any,
    Exact(&'static str),
    /// The base path itself and everything below it (`base/…`), but not `base-suffix`.
    Subtree(&'static str),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(exact) => path == *exact,
            PathPattern::Subtree(base) => path
                .strip_prefix(base)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub method: MethodMatch,
    pub paths: &'static [PathPattern],
    pub requirement: Requirement,
}

impl Rule {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method) && self.paths.iter().any(|p| p.matches(path))
    }
}

/// The authoritative access table. `GET /api/auth/me` is public so its handler can answer
/// 401 itself; every route read (`/api/routes` and below) is public and relies on the
/// visibility rule for what it returns.
pub const ACCESS_RULES: &[Rule] = &[
    Rule {
        method: MethodMatch::Options,
        paths: &[PathPattern::Any],
        requirement: Requirement::Public,
    },
    Rule {
        method: MethodMatch::Get,
        paths: &[PathPattern::Exact("/health")],
        requirement: Requirement::Public,
    },
    Rule {
        method: MethodMatch::Get,
        paths: &[
            PathPattern::Subtree("/swagger-ui"),
            PathPattern::Subtree("/api-docs"),
        ],
        requirement: Requirement::Public,
    },
    Rule {
        method: MethodMatch::Post,
        paths: &[PathPattern::Exact(AUTH_LOGIN), PathPattern::Exact(AUTH_REGISTER)],
        requirement: Requirement::Public,
    },
    Rule {
        method: MethodMatch::Get,
        paths: &[PathPattern::Exact(AUTH_WHOAMI)],
        requirement: Requirement::Public,
    },
    Rule {
        method: MethodMatch::Get,
        paths: &[PathPattern::Subtree(ROUTES_BASE)],
        requirement: Requirement::Public,
    },
];

/// RouteMatcher
///
/// Decides, per (method, path), whether an established identity is required.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatcher {
    rules: &'static [Rule],
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::new(ACCESS_RULES)
    }
}

impl RouteMatcher {
    pub const fn new(rules: &'static [Rule]) -> Self {
        Self { rules }
    }

    pub fn requirement(&self, method: &Method, path: &str) -> Requirement {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.requirement)
            .unwrap_or(Requirement::Authenticated)
    }
}

/// Paths on which the authentication middleware skips token processing entirely.
pub fn is_credential_endpoint(path: &str) -> bool {
    path == AUTH_LOGIN || path == AUTH_REGISTER
}

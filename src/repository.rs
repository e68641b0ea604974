use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    auth::same_subject,
    geometry::{ROUTE_SRID, canonical_wkt},
    models::{NewRoute, NewUser, Route, User},
};

/// RepositoryError
///
/// Failures surfaced by the persistence layer. `Conflict` is raised for unique-constraint
/// violations (duplicate email); everything else is an opaque database failure.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so services never know
/// whether they talk to Postgres or to the in-memory store used by tests.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    // Email lookups ignore case, matching the unique index on LOWER(email).
    async fn exists_by_email(&self, email: &str) -> Result<bool, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    // Fails with `Conflict` if the email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    // --- Routes ---
    async fn create_route(&self, route: NewRoute) -> Result<Route, RepositoryError>;
    async fn find_route(&self, id: i64) -> Result<Option<Route>, RepositoryError>;
    // Owner match is case-insensitive, mirroring the ownership rule.
    async fn find_routes_by_owner(&self, owner: &str) -> Result<Vec<Route>, RepositoryError>;
    // Public routes newest first, plus the total number of public routes.
    async fn find_public_routes(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Route>, i64), RepositoryError>;
    // Overwrites every mutable column. Returns `None` if the row vanished.
    async fn save_route(&self, route: &Route) -> Result<Option<Route>, RepositoryError>;
    async fn delete_route(&self, id: i64) -> Result<bool, RepositoryError>;

    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const ROUTE_COLUMNS: &str = "id, owner_username, name, distance_meters, is_public, created_at, \
     ST_AsText(geom) AS geom_wkt";

const DUPLICATE_EMAIL: &str = "Email already in use";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL with PostGIS.
/// Geometry travels as WKT: written with `ST_GeomFromText`, read with `ST_AsText`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// PostGIS renders WKT in its own style; hand callers the canonical form.
fn with_canonical_geometry(mut route: Route) -> Route {
    route.geom_wkt = route.geom_wkt.map(canonical_wkt);
    route
}

fn log_db_error(op: &'static str) -> impl Fn(sqlx::Error) -> RepositoryError {
    move |e| {
        tracing::error!(operation = op, error = ?e, "database error");
        RepositoryError::Database(e)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn exists_by_email(&self, email: &str) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(log_db_error("exists_by_email"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, role FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db_error("find_user_by_email"))
    }

    /// create_user
    ///
    /// Inserts the account. A unique violation on `email` (two registrations racing past the
    /// existence check) is reported as `Conflict`, not as a database failure.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let result = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (username, email, password, role)
               VALUES ($1, $2, $3, $4)
               RETURNING id, username, email, password, role"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepositoryError::Conflict(DUPLICATE_EMAIL.to_string()))
            }
            Err(e) => Err(log_db_error("create_user")(e)),
        }
    }

    async fn create_route(&self, route: NewRoute) -> Result<Route, RepositoryError> {
        let sql = format!(
            r#"INSERT INTO routes (owner_username, name, distance_meters, is_public, created_at, geom)
               VALUES ($1, $2, $3, $4, NOW(), ST_GeomFromText($5, $6))
               RETURNING {ROUTE_COLUMNS}"#
        );
        sqlx::query_as::<_, Route>(&sql)
            .bind(&route.owner_username)
            .bind(&route.name)
            .bind(route.distance_meters)
            .bind(route.is_public)
            .bind(&route.geom_wkt)
            .bind(ROUTE_SRID)
            .fetch_one(&self.pool)
            .await
            .map(with_canonical_geometry)
            .map_err(log_db_error("create_route"))
    }

    async fn find_route(&self, id: i64) -> Result<Option<Route>, RepositoryError> {
        let sql = format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE id = $1");
        sqlx::query_as::<_, Route>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|route| route.map(with_canonical_geometry))
            .map_err(log_db_error("find_route"))
    }

    async fn find_routes_by_owner(&self, owner: &str) -> Result<Vec<Route>, RepositoryError> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE LOWER(owner_username) = LOWER($1) \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Route>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map(|routes| routes.into_iter().map(with_canonical_geometry).collect())
            .map_err(log_db_error("find_routes_by_owner"))
    }

    /// find_public_routes
    ///
    /// **Security**: Strictly enforces `WHERE is_public = true` in both the page and the count.
    async fn find_public_routes(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Route>, i64), RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM routes WHERE is_public = true")
            .fetch_one(&self.pool)
            .await
            .map_err(log_db_error("count_public_routes"))?;

        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE is_public = true \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let routes = sqlx::query_as::<_, Route>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db_error("find_public_routes"))?;

        Ok((routes.into_iter().map(with_canonical_geometry).collect(), total))
    }

    async fn save_route(&self, route: &Route) -> Result<Option<Route>, RepositoryError> {
        let sql = format!(
            r#"UPDATE routes
               SET name = $2, distance_meters = $3, is_public = $4, geom = ST_GeomFromText($5, $6)
               WHERE id = $1
               RETURNING {ROUTE_COLUMNS}"#
        );
        sqlx::query_as::<_, Route>(&sql)
            .bind(route.id)
            .bind(&route.name)
            .bind(route.distance_meters)
            .bind(route.is_public)
            .bind(&route.geom_wkt)
            .bind(ROUTE_SRID)
            .fetch_optional(&self.pool)
            .await
            .map(|route| route.map(with_canonical_geometry))
            .map_err(log_db_error("save_route"))
    }

    async fn delete_route(&self, id: i64) -> Result<bool, RepositoryError> {
        sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(log_db_error("delete_route"))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(log_db_error("ping"))
    }
}

// --- In-Memory Implementation (For Tests) ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    routes: BTreeMap<i64, Route>,
    next_user_id: i64,
    next_route_id: i64,
}

/// InMemoryRepository
///
/// A `Repository` over process memory, used by the test suites so handler and service
/// logic can be exercised without a database. Emails are unique ignoring case, as the
/// `users` table's `LOWER(email)` index enforces it.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    /// When true, every operation fails with a simulated database error.
    pub should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.should_fail {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn exists_by_email(&self, email: &str) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .any(|u| same_subject(&u.email, email)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| same_subject(&u.email, email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| same_subject(&u.email, &user.email)) {
            return Err(RepositoryError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn create_route(&self, route: NewRoute) -> Result<Route, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.next_route_id += 1;
        let created = Route {
            id: tables.next_route_id,
            owner_username: route.owner_username,
            name: route.name,
            distance_meters: route.distance_meters,
            is_public: route.is_public,
            created_at: Utc::now(),
            geom_wkt: route.geom_wkt,
        };
        tables.routes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_route(&self, id: i64) -> Result<Option<Route>, RepositoryError> {
        self.check()?;
        Ok(self.tables.read().await.routes.get(&id).cloned())
    }

    async fn find_routes_by_owner(&self, owner: &str) -> Result<Vec<Route>, RepositoryError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .routes
            .values()
            .rev()
            .filter(|r| same_subject(&r.owner_username, owner))
            .cloned()
            .collect())
    }

    async fn find_public_routes(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Route>, i64), RepositoryError> {
        self.check()?;
        let tables = self.tables.read().await;
        // Ids are allocated in creation order, so reverse id order is newest first.
        let public: Vec<&Route> = tables.routes.values().rev().filter(|r| r.is_public).collect();
        let total = public.len() as i64;
        let page = public
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn save_route(&self, route: &Route) -> Result<Option<Route>, RepositoryError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.routes.get_mut(&route.id) else {
            return Ok(None);
        };
        stored.name = route.name.clone();
        stored.distance_meters = route.distance_meters;
        stored.is_public = route.is_public;
        stored.geom_wkt = route.geom_wkt.clone();
        Ok(Some(stored.clone()))
    }

    async fn delete_route(&self, id: i64) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.tables.write().await.routes.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }
}

use crate::{
    auth::{PasswordState, TokenState, normalize_subject},
    error::ApiError,
    models::{AuthResponse, LoginRequest, NewUser, RegisterRequest, Role, User},
    repository::RepositoryState,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// AuthService
///
/// Registration and login. Storage and password hashing are external capabilities reached
/// through the repository and the password encoder; on success a session token is issued
/// through the shared `TokenCodec`.
#[derive(Clone)]
pub struct AuthService {
    repo: RepositoryState,
    passwords: PasswordState,
    tokens: TokenState,
}

impl AuthService {
    pub fn new(repo: RepositoryState, passwords: PasswordState, tokens: TokenState) -> Self {
        Self {
            repo,
            passwords,
            tokens,
        }
    }

    /// register
    ///
    /// Creates an account and signs the caller in.
    ///
    /// * Blank email or password: `BadRequest`.
    /// * Role present but not `USER`/`ADMIN`: `BadRequest`. Absent or blank: `USER`.
    /// * Email already registered: `Conflict`, both from the explicit check and from the
    ///   unique constraint when two registrations race.
    ///
    /// The email is stored lowercased, so one address maps to exactly one account and one
    /// token subject. The plaintext password only ever reaches the hasher; it is neither
    /// stored nor logged.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let email = normalize_subject(&req.email);
        if email.is_empty() || req.password.is_empty() {
            return Err(ApiError::BadRequest(
                "Email and password are required".to_string(),
            ));
        }

        let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
            None => Role::default(),
        };

        if self.repo.exists_by_email(&email).await? {
            tracing::info!(%email, "registration refused: email already in use");
            return Err(ApiError::Conflict("Email already in use".to_string()));
        }

        let password_hash = self.hash_password(req.password).await?;

        let user = self
            .repo
            .create_user(NewUser {
                // The email doubles as the username.
                username: email.clone(),
                email,
                password_hash,
                role,
            })
            .await?;

        tracing::info!(email = %user.email, role = %user.role, "user registered");
        self.session_for(&user)
    }

    /// login
    ///
    /// Verifies the credentials and issues a token carrying the stored role. Unknown email,
    /// wrong password and missing fields all produce the same `Unauthorized` error.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        let email = normalize_subject(&req.email);
        if email.is_empty() || req.password.is_empty() {
            return Err(invalid_credentials());
        }

        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            tracing::warn!(%email, "login failed");
            return Err(invalid_credentials());
        };

        if !self
            .verify_password(req.password, user.password_hash.clone())
            .await?
        {
            tracing::warn!(%email, "login failed");
            return Err(invalid_credentials());
        }

        tracing::info!(email = %user.email, "user logged in");
        self.session_for(&user)
    }

    fn session_for(&self, user: &User) -> Result<AuthResponse, ApiError> {
        let token = self
            .tokens
            .issue_default(&user.email, Some(user.role))
            .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))?;

        Ok(AuthResponse {
            token: token.into_string(),
            email: user.email.clone(),
            role: user.role,
        })
    }

    // Runs on the blocking pool.
    async fn hash_password(&self, plaintext: String) -> Result<String, ApiError> {
        let encoder = self.passwords.clone();
        tokio::task::spawn_blocking(move || encoder.hash(&plaintext))
            .await
            .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    async fn verify_password(&self, plaintext: String, hash: String) -> Result<bool, ApiError> {
        let encoder = self.passwords.clone();
        tokio::task::spawn_blocking(move || encoder.verify(&plaintext, &hash))
            .await
            .map_err(|e| ApiError::Internal(format!("password verification task failed: {e}")))
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
}

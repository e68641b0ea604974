use chrono::Duration;
use orienteering_api::{
    auth::{PasswordEncoder, PasswordError, PasswordState, TokenCodec, TokenState},
    error::ApiError,
    models::{LoginRequest, RegisterRequest, Role},
    repository::{InMemoryRepository, Repository, RepositoryState},
    services::AuthService,
};
use std::sync::Arc;

const SECRET: &[u8] = b"auth-service-test-secret-0123456789abcd";

// --- Mock Password Encoder ---

/// Reversible stand-in for Argon2 so the suite stays fast. Never equal to the plaintext.
struct MockPasswordEncoder;

impl PasswordEncoder for MockPasswordEncoder {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        Ok(format!("mock${}", plaintext.chars().rev().collect::<String>()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        self.hash(plaintext).is_ok_and(|expected| expected == hash)
    }
}

struct Fixture {
    service: AuthService,
    repo: Arc<InMemoryRepository>,
    tokens: TokenState,
}

fn fixture() -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    let tokens: TokenState = Arc::new(TokenCodec::new(SECRET, Duration::hours(24)));
    let passwords = Arc::new(MockPasswordEncoder) as PasswordState;
    let service = AuthService::new(repo.clone() as RepositoryState, passwords, tokens.clone());
    Fixture {
        service,
        repo,
        tokens,
    }
}

fn register_request(email: &str, password: &str, role: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        role: role.map(str::to_string),
    }
}

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

// --- Registration ---

#[tokio::test]
async fn test_register_defaults_to_user_role_and_issues_token() {
    let fx = fixture();
    let response = fx
        .service
        .register(register_request("runner@example.com", "s3cret", None))
        .await
        .unwrap();

    assert_eq!(response.email, "runner@example.com");
    assert_eq!(response.role, Role::User);
    assert_eq!(
        fx.tokens.peek_subject(&response.token).as_deref(),
        Some("runner@example.com")
    );
    assert_eq!(fx.tokens.peek_role(&response.token), Some(Role::User));

    // The email doubles as username, and only the hash is stored.
    let stored = fx
        .repo
        .find_user_by_email("runner@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.username, "runner@example.com");
    assert_ne!(stored.password_hash, "s3cret");
}

#[tokio::test]
async fn test_register_accepts_role_case_insensitively() {
    let fx = fixture();
    let response = fx
        .service
        .register(register_request("admin@example.com", "pw", Some("admin")))
        .await
        .unwrap();

    assert_eq!(response.role, Role::Admin);
    assert_eq!(fx.tokens.peek_role(&response.token), Some(Role::Admin));
}

#[tokio::test]
async fn test_register_rejects_unknown_role() {
    let fx = fixture();
    let result = fx
        .service
        .register(register_request("runner@example.com", "pw", Some("SUPERUSER")))
        .await;

    assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg.contains("SUPERUSER")));
    // Nothing was persisted.
    assert!(!fx.repo.exists_by_email("runner@example.com").await.unwrap());
}

#[tokio::test]
async fn test_register_rejects_blank_fields() {
    let fx = fixture();
    for (email, password) in [("", "pw"), ("   ", "pw"), ("runner@example.com", "")] {
        let result = fx
            .service
            .register(register_request(email, password, None))
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let fx = fixture();
    fx.service
        .register(register_request("runner@example.com", "first", None))
        .await
        .unwrap();

    let result = fx
        .service
        .register(register_request("runner@example.com", "second", None))
        .await;
    assert!(matches!(result, Err(ApiError::Conflict(msg)) if msg == "Email already in use"));

    // The original credentials still work.
    assert!(
        fx.service
            .login(login_request("runner@example.com", "first"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_email_case_variants_share_one_account() {
    let fx = fixture();
    let first = fx
        .service
        .register(register_request("Alice@Example.com", "first", None))
        .await
        .unwrap();
    assert_eq!(first.email, "alice@example.com");

    // A second account under a case variant would own everything the first one owns.
    let result = fx
        .service
        .register(register_request("ALICE@example.com", "second", None))
        .await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));

    let login = fx
        .service
        .login(login_request("aLiCe@EXAMPLE.com", "first"))
        .await
        .unwrap();
    assert_eq!(login.email, "alice@example.com");
    assert_eq!(
        fx.tokens.peek_subject(&login.token).as_deref(),
        Some("alice@example.com")
    );

    let result = fx
        .service
        .login(login_request("ALICE@example.com", "second"))
        .await;
    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
}

#[tokio::test]
async fn test_register_surfaces_database_failure_as_internal() {
    let tokens: TokenState = Arc::new(TokenCodec::new(SECRET, Duration::hours(24)));
    let service = AuthService::new(
        Arc::new(InMemoryRepository::new_failing()) as RepositoryState,
        Arc::new(MockPasswordEncoder) as PasswordState,
        tokens,
    );

    let result = service
        .register(register_request("runner@example.com", "pw", None))
        .await;
    assert!(matches!(result, Err(ApiError::Internal(_))));
}

// --- Login ---

#[tokio::test]
async fn test_login_issues_token_with_stored_role() {
    let fx = fixture();
    fx.service
        .register(register_request("admin@example.com", "pw", Some("ADMIN")))
        .await
        .unwrap();

    let response = fx
        .service
        .login(login_request("admin@example.com", "pw"))
        .await
        .unwrap();

    assert_eq!(response.role, Role::Admin);
    assert_eq!(
        fx.tokens.peek_subject(&response.token).as_deref(),
        Some("admin@example.com")
    );
    assert_eq!(fx.tokens.peek_role(&response.token), Some(Role::Admin));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let fx = fixture();
    fx.service
        .register(register_request("runner@example.com", "right", None))
        .await
        .unwrap();

    let attempts = [
        login_request("runner@example.com", "wrong"),
        login_request("nobody@example.com", "right"),
        login_request("", "right"),
        login_request("runner@example.com", ""),
    ];

    for attempt in attempts {
        match fx.service.login(attempt).await {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("expected Unauthorized, got {:?}", other.map(|r| r.email)),
        }
    }
}

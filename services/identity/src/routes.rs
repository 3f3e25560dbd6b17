//! Identity service routes
//!
//! Register and login issue an access/refresh token pair; verify and logout
//! take a bearer token; refresh exchanges a refresh-type token for a new
//! access token. Mutating endpoints are rate limited per client address.

use axum::{
    Json, Router,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{error, info};
use uuid::Uuid;

use common::token::TokenKind;

use crate::{AppState, error::AuthError, password, repositories::CreateUserError, validation};

/// Response for register and login
#[derive(Serialize)]
pub struct TokenResponse {
    pub message: String,
    pub user_id: Uuid,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Request carrying user credentials
#[derive(Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Response for token refresh
#[derive(Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

/// Response for token verification
#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: Uuid,
    pub username: String,
    pub expires_at: u64,
}

/// Create the router for the identity service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify", post(verify))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "identity-service",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Register a new user and issue an initial token pair
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if !state.register_limiter.is_allowed(&addr.ip().to_string()).await {
        return Err(AuthError::RateLimited);
    }

    validation::validate_username(&payload.username).map_err(AuthError::Validation)?;
    validation::validate_password(&payload.password).map_err(AuthError::Validation)?;

    let password_hash = password::hash_password(&payload.password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        AuthError::Internal
    })?;

    // Duplicate detection is left to the store, where it holds under
    // concurrent registrations for the same name.
    let user = state
        .user_repository
        .create(&payload.username, &password_hash)
        .await
        .map_err(|e| match e {
            CreateUserError::DuplicateUsername => AuthError::Conflict,
            CreateUserError::Store(e) => {
                error!("Failed to create user: {}", e);
                AuthError::Internal
            }
        })?;

    let (access_token, refresh_token) = issue_token_pair(&state, user.id, &user.username)?;

    info!("User registered: {}", user.username);

    let response = TokenResponse {
        message: "User registered successfully".to_string(),
        user_id: user.id,
        username: user.username,
        access_token,
        refresh_token,
        expires_in: state.token_service.access_token_expiry(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Authenticate a user and issue a fresh token pair
///
/// Prior tokens stay valid until their natural expiry; there is no
/// revocation list.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if !state.login_limiter.is_allowed(&addr.ip().to_string()).await {
        return Err(AuthError::RateLimited);
    }

    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AuthError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let user = state
        .user_repository
        .find_by_username(&payload.username)
        .await
        .map_err(|e| {
            error!("Failed to look up user: {}", e);
            AuthError::Internal
        })?
        .ok_or(AuthError::InvalidCredentials)?;

    let valid = password::verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!("Failed to verify password: {}", e);
        AuthError::Internal
    })?;
    if !valid {
        return Err(AuthError::InvalidCredentials);
    }

    let (access_token, refresh_token) = issue_token_pair(&state, user.id, &user.username)?;

    info!("User logged in: {}", user.username);

    let response = TokenResponse {
        message: "Login successful".to_string(),
        user_id: user.id,
        username: user.username,
        access_token,
        refresh_token,
        expires_in: state.token_service.access_token_expiry(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Verify a bearer token and echo its claims
pub async fn verify(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<impl IntoResponse, AuthError> {
    let TypedHeader(bearer) = bearer.ok_or(AuthError::InvalidToken)?;

    let claims = state
        .token_service
        .verify(bearer.token())
        .map_err(|_| AuthError::InvalidToken)?;

    let response = VerifyResponse {
        valid: true,
        user_id: claims.sub,
        username: claims.username,
        expires_at: claims.exp,
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Exchange a refresh token for a new access token
///
/// The refresh token itself is not rotated or invalidated.
pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if !state.refresh_limiter.is_allowed(&addr.ip().to_string()).await {
        return Err(AuthError::RateLimited);
    }

    if payload.refresh_token.is_empty() {
        return Err(AuthError::Validation(
            "Refresh token is required".to_string(),
        ));
    }

    let claims = state
        .token_service
        .verify(&payload.refresh_token)
        .map_err(|_| AuthError::InvalidToken)?;

    if claims.kind != TokenKind::Refresh {
        return Err(AuthError::InvalidToken);
    }

    let access_token = state
        .token_service
        .issue(claims.sub, &claims.username, TokenKind::Access)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::Internal
        })?;

    let response = RefreshTokenResponse {
        access_token,
        expires_in: state.token_service.access_token_expiry(),
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Logout endpoint
///
/// Stateless: the token stays valid until its natural expiry. Documented
/// limitation of the stateless token scheme.
pub async fn logout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<impl IntoResponse, AuthError> {
    let TypedHeader(bearer) = bearer.ok_or(AuthError::InvalidToken)?;

    state
        .token_service
        .verify(bearer.token())
        .map_err(|_| AuthError::InvalidToken)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

fn issue_token_pair(
    state: &AppState,
    user_id: Uuid,
    username: &str,
) -> Result<(String, String), AuthError> {
    let access_token = state
        .token_service
        .issue(user_id, username, TokenKind::Access)
        .map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::Internal
        })?;

    let refresh_token = state
        .token_service
        .issue(user_id, username, TokenKind::Refresh)
        .map_err(|e| {
            error!("Failed to generate refresh token: {}", e);
            AuthError::Internal
        })?;

    Ok((access_token, refresh_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimiter;
    use crate::repositories::UserRepository;
    use common::token::{TokenConfig, TokenService};
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState {
            user_repository: UserRepository::in_memory(),
            token_service: TokenService::new(TokenConfig {
                secret: "test-secret".to_string(),
                access_token_expiry: 86400,
                refresh_token_expiry: 604800,
            }),
            register_limiter: RateLimiter::new(100, Duration::from_secs(300)),
            login_limiter: RateLimiter::new(100, Duration::from_secs(300)),
            refresh_limiter: RateLimiter::new(100, Duration::from_secs(60)),
        }
    }

    async fn spawn_service(state: AppState) -> String {
        let app = create_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        format!("http://{}", addr)
    }

    async fn register_user(
        client: &reqwest::Client,
        base: &str,
        username: &str,
        password: &str,
    ) -> reqwest::Response {
        client
            .post(format!("{}/register", base))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_issues_verifiable_tokens() {
        let state = test_state();
        let token_service = state.token_service.clone();
        let base = spawn_service(state).await;
        let client = reqwest::Client::new();

        let resp = register_user(&client, &base, "alice", "password1").await;
        assert_eq!(resp.status(), 201);

        let body: serde_json::Value = resp.json().await.unwrap();
        let access = body["access_token"].as_str().unwrap();
        let refresh = body["refresh_token"].as_str().unwrap();

        let claims = token_service.verify(access).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.username, "alice");

        let claims = token_service.verify(refresh).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn duplicate_register_conflicts() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        assert_eq!(register_user(&client, &base, "alice", "pw123456").await.status(), 201);
        assert_eq!(register_user(&client, &base, "alice", "pw123456").await.status(), 409);
    }

    #[tokio::test]
    async fn concurrent_registers_for_one_name_yield_one_user() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let (first, second) = tokio::join!(
            register_user(&client, &base, "alice", "pw123456"),
            register_user(&client, &base, "alice", "pw123456"),
        );

        let mut statuses = [first.status().as_u16(), second.status().as_u16()];
        statuses.sort();
        assert_eq!(statuses, [201, 409]);
    }

    #[tokio::test]
    async fn register_without_fields_is_bad_request() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/register", base))
            .json(&serde_json::json!({"username": "alice"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        register_user(&client, &base, "alice", "right-pass").await;

        let resp = client
            .post(format!("{}/login", base))
            .json(&serde_json::json!({"username": "alice", "password": "wrong-pass"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .post(format!("{}/login", base))
            .json(&serde_json::json!({"username": "nobody", "password": "whatever"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn login_issues_a_fresh_access_token() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = register_user(&client, &base, "alice", "password1").await;
        let first: serde_json::Value = resp.json().await.unwrap();

        // iat has one-second granularity; make sure the clock advances.
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let resp = client
            .post(format!("{}/login", base))
            .json(&serde_json::json!({"username": "alice", "password": "password1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let second: serde_json::Value = resp.json().await.unwrap();

        assert_ne!(first["access_token"], second["access_token"]);
    }

    #[tokio::test]
    async fn verify_accepts_issued_token_and_rejects_garbage() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = register_user(&client, &base, "alice", "password1").await;
        let body: serde_json::Value = resp.json().await.unwrap();
        let access = body["access_token"].as_str().unwrap();

        let resp = client
            .post(format!("{}/verify", base))
            .bearer_auth(access)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let verified: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(verified["valid"], true);
        assert_eq!(verified["username"], "alice");

        let resp = client
            .post(format!("{}/verify", base))
            .bearer_auth("not-a-real-token")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client.post(format!("{}/verify", base)).send().await.unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn refresh_requires_a_refresh_type_token() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = register_user(&client, &base, "alice", "password1").await;
        let body: serde_json::Value = resp.json().await.unwrap();

        // An access-type token must not pass for a refresh token.
        let resp = client
            .post(format!("{}/refresh", base))
            .json(&serde_json::json!({"refresh_token": body["access_token"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .post(format!("{}/refresh", base))
            .json(&serde_json::json!({"refresh_token": body["refresh_token"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let refreshed: serde_json::Value = resp.json().await.unwrap();
        assert!(refreshed["access_token"].as_str().is_some());
    }

    #[tokio::test]
    async fn refresh_without_token_is_bad_request() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/refresh", base))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn logout_requires_a_valid_token() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = register_user(&client, &base, "alice", "password1").await;
        let body: serde_json::Value = resp.json().await.unwrap();
        let access = body["access_token"].as_str().unwrap();

        let resp = client
            .post(format!("{}/logout", base))
            .bearer_auth(access)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // No revocation list: the token still verifies afterwards.
        let resp = client
            .post(format!("{}/verify", base))
            .bearer_auth(access)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client.post(format!("{}/logout", base)).send().await.unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn register_is_rate_limited_without_mutating_state() {
        let mut state = test_state();
        state.register_limiter = RateLimiter::new(2, Duration::from_secs(300));
        let base = spawn_service(state).await;
        let client = reqwest::Client::new();

        assert_eq!(register_user(&client, &base, "user_one", "pw123456").await.status(), 201);
        assert_eq!(register_user(&client, &base, "user_two", "pw123456").await.status(), 201);

        let resp = register_user(&client, &base, "user_three", "pw123456").await;
        assert_eq!(resp.status(), 429);

        // The rejected registration must not have created the user.
        let resp = client
            .post(format!("{}/login", base))
            .json(&serde_json::json!({"username": "user_three", "password": "pw123456"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let base = spawn_service(test_state()).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["service"], "identity-service");
        assert_eq!(body["status"], "healthy");
    }
}

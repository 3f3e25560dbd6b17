//! HTTP client for the identity service
//!
//! Calls are bounded by a request timeout and never retried: a failed call
//! is "service unavailable" and the caller takes the degraded local path.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Identity service client configuration
#[derive(Debug, Clone)]
pub struct AuthClientConfig {
    /// Base URL of the identity service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl AuthClientConfig {
    /// Create a new AuthClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_SERVICE_URL`: base URL (default: "http://localhost:5001")
    /// - `AUTH_SERVICE_TIMEOUT_SECONDS`: request timeout (default: 5)
    pub fn from_env() -> Self {
        let base_url = std::env::var("AUTH_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:5001".to_string());

        let timeout_seconds = std::env::var("AUTH_SERVICE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        AuthClientConfig {
            base_url,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

/// Token pair returned by the identity service
#[derive(Debug, Deserialize)]
pub struct AuthTokens {
    pub user_id: Uuid,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Failure modes of an identity service call
#[derive(Error, Debug)]
pub enum AuthClientError {
    /// Unknown user or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Username already taken
    #[error("{0}")]
    Conflict(String),

    /// Request rejected for another reason (validation, rate limit)
    #[error("{0}")]
    Rejected(String),

    /// Timeout, connection failure, or an unreadable response
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

/// Identity service client
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    /// Create a new client with the configured timeout
    pub fn new(config: &AuthClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Log a user in, returning the issued token pair
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthTokens, AuthClientError> {
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .map_err(|e| {
                error!("Identity service login call failed: {}", e);
                AuthClientError::Unavailable(e.to_string())
            })?;

        match response.status().as_u16() {
            200 => response
                .json()
                .await
                .map_err(|e| AuthClientError::Unavailable(e.to_string())),
            401 => Err(AuthClientError::InvalidCredentials),
            _ => Err(AuthClientError::Rejected(error_message(response).await)),
        }
    }

    /// Register a user, returning the issued token pair
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthTokens, AuthClientError> {
        let response = self
            .client
            .post(format!("{}/register", self.base_url))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .map_err(|e| {
                error!("Identity service register call failed: {}", e);
                AuthClientError::Unavailable(e.to_string())
            })?;

        match response.status().as_u16() {
            201 => response
                .json()
                .await
                .map_err(|e| AuthClientError::Unavailable(e.to_string())),
            409 => Err(AuthClientError::Conflict(error_message(response).await)),
            _ => Err(AuthClientError::Rejected(error_message(response).await)),
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<serde_json::Value>().await {
        Ok(body) => body["error"]
            .as_str()
            .unwrap_or(status.as_str())
            .to_string(),
        Err(_) => status.to_string(),
    }
}

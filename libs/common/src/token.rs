//! Signed token issuance and verification
//!
//! Both services hold the same `SECRET_KEY`, so tokens are HS256-signed
//! claim bundles verified symmetrically. Validity is purely a function of
//! signature and expiry; nothing is persisted server-side.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Shared secret used for signing and verifying tokens
    pub secret: String,
    /// Access token expiration time in seconds (default: 24 hours)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl TokenConfig {
    /// Create a new TokenConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SECRET_KEY`: shared signing secret (default: "demo-secret-key")
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: access token expiry in seconds (default: 86400)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Self {
        let secret =
            std::env::var("SECRET_KEY").unwrap_or_else(|_| "demo-secret-key".to_string());

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "86400".to_string()) // 24 hours
            .parse()
            .unwrap_or(86400);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        TokenConfig {
            secret,
            access_token_expiry,
            refresh_token_expiry,
        }
    }
}

/// Token claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Username the token was issued for
    pub username: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token kind (access or refresh)
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

/// Token kind enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Access token, accepted by protected endpoints
    #[serde(rename = "access")]
    Access,
    /// Refresh token, accepted only by the refresh endpoint
    #[serde(rename = "refresh")]
    Refresh,
}

/// Reason a token was rejected
///
/// Rejections are non-fatal: callers treat them as "unauthenticated".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed or has an invalid signature")]
    Malformed,
}

/// Token service for issuing and verifying signed tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: TokenConfig,
}

impl TokenService {
    /// Initialize a new token service from a configuration
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        TokenService {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Issue a signed token for a user
    ///
    /// Pure function of the inputs and the current time; nothing is stored.
    pub fn issue(&self, user_id: Uuid, username: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let expiry = match kind {
            TokenKind::Access => self.config.access_token_expiry,
            TokenKind::Refresh => self.config.refresh_token_expiry,
        };

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + expiry,
            kind,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify a token's signature and expiry, returning the decoded claims
    ///
    /// Tokens signed with a different secret or algorithm are rejected as
    /// malformed; an exceeded `exp` is rejected as expired.
    pub fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(VerifyError::Expired),
                _ => Err(VerifyError::Malformed),
            },
        }
    }

    /// Get the access token expiry time in seconds
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time in seconds
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}

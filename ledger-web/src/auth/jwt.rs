//! JWT issuance and verification

use crate::handlers::types::ApiResponse;
use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use ledger_core::{AuthConfig, Role, MAX_TOKEN_TTL_HOURS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// JWT signing and verification keys
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// JWT Claims structure.
///
/// `role` is copied at issuance and never re-read from storage, so a role
/// change only takes effect once the outstanding token expires.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, username: &str, role: Role, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Token and credential failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token creation failed")]
    TokenCreation,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing authorization header")]
    MissingAuthHeader,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::TokenCreation => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::TokenCreation => "token_creation_failed",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::MissingAuthHeader => "missing_auth_header",
        }
    }

    pub fn client_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid username or password",
            AuthError::TokenCreation => "Failed to create authentication token",
            AuthError::InvalidToken => "Invalid or malformed token",
            AuthError::InvalidSignature => "Token signature verification failed",
            AuthError::TokenExpired => "Token has expired",
            AuthError::MissingAuthHeader => "Authorization header is required",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiResponse::failure_response(self.status(), self.client_message(), self.error_code())
    }
}

/// Issues and verifies signed, time-limited tokens.
///
/// Cheap to clone; the keys are shared.
#[derive(Clone)]
pub struct JwtService {
    keys: Arc<Keys>,
    ttl: Duration,
    validation: Validation,
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_seconds", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            keys: Arc::new(Keys::new(secret.as_bytes())),
            ttl,
            validation,
        }
    }

    /// Lifetime is clamped to `1..=MAX_TOKEN_TTL_HOURS`
    pub fn from_config(config: &AuthConfig) -> Self {
        let hours = config.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS);
        Self::new(config.signing_secret(), Duration::hours(hours))
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token for an identity, valid from now
    pub fn issue(&self, user_id: i64, username: &str, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, username, role, Utc::now())
    }

    /// Issue a token as if it had been created at `issued_at`
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, username, role, issued_at, self.ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding).map_err(|e| {
            warn!("Failed to encode JWT token: {}", e);
            AuthError::TokenCreation
        })
    }

    /// Verify signature and expiry, then decode the claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.keys.decoding, &self.validation).map_err(
            |e| {
                debug!("Token verification failed: {}", e);
                match e.kind() {
                    JwtErrorKind::InvalidSignature => AuthError::InvalidSignature,
                    JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            },
        )?;

        let claims = token_data.claims;
        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Extract and verify the `Bearer` token of an Authorization header
    pub fn verify_header(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidToken)?;
        self.verify(token)
    }
}

//! User management and authentication

use super::jwt::{AuthError, JwtService};
use crate::store::UserRepository;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use ledger_core::{
    not_found_error, validation_error, ErrorContext, LedgerError, LedgerResult, Role, UserAccount,
    UserProfile,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 50;

/// User registration request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "alice")]
    pub username: Option<String>,
    pub password: Option<String>,
}

/// User login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice")]
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Password change request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

/// Successful login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: UserProfile,
}

impl From<AuthError> for LedgerError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenCreation => LedgerError::internal(error.client_message(), "auth"),
            other => LedgerError::authentication(other.client_message(), "auth"),
        }
    }
}

/// Registration, login and password changes over the credential store
#[derive(Debug, Clone)]
pub struct UserService {
    users: UserRepository,
    jwt: JwtService,
    min_password_length: usize,
}

impl UserService {
    pub fn new(users: UserRepository, jwt: JwtService, min_password_length: usize) -> Self {
        Self {
            users,
            jwt,
            min_password_length,
        }
    }

    fn check_password_strength(&self, password: &str, field: &str) -> LedgerResult<()> {
        if password.chars().count() < self.min_password_length {
            return Err(validation_error!(
                format!(
                    "Password must be at least {} characters long",
                    self.min_password_length
                ),
                field,
                "auth"
            ));
        }
        Ok(())
    }

    /// Register a new basic-tier identity
    pub async fn register(&self, request: RegisterRequest) -> LedgerResult<UserProfile> {
        let username = request.username.as_deref().map(str::trim).unwrap_or("");
        let password = request.password.as_deref().unwrap_or("");
        debug!("Starting user registration for: {}", username);

        if username.is_empty() || password.is_empty() {
            return Err(validation_error!(
                "Username and password are required",
                "username",
                "auth"
            ));
        }

        let length = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
            return Err(validation_error!(
                format!(
                    "Username must be between {} and {} characters",
                    USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
                ),
                "username",
                "auth"
            ));
        }
        self.check_password_strength(password, "password")?;

        if self.users.exists(username).await? {
            return Err(LedgerError::conflict("Username already exists", "auth"));
        }

        let hash = hash_password(password)?;
        let account = self.users.create(username, &hash, Role::User).await?;
        info!(user_id = account.id, username = %account.username, "User registered");
        Ok(account.profile())
    }

    /// Check credentials and issue a token carrying the stored role
    pub async fn login(&self, request: LoginRequest) -> LedgerResult<(UserAccount, LoginResponse)> {
        let username = request.username.as_deref().map(str::trim).unwrap_or("");
        let password = request.password.as_deref().unwrap_or("");

        if username.is_empty() || password.is_empty() {
            return Err(validation_error!(
                "Username and password are required",
                "username",
                "auth"
            ));
        }

        let account = match self.users.find_by_username(username).await? {
            Some(account) if verify_password(password, &account.password_hash) => account,
            _ => return Err(AuthError::InvalidCredentials.into()),
        };

        let access_token = self
            .jwt
            .issue(account.id, &account.username, account.role)?;

        let response = LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.ttl_seconds(),
            user: account.profile(),
        };
        Ok((account, response))
    }

    pub async fn profile(&self, user_id: i64) -> LedgerResult<UserProfile> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|account| account.profile())
            .ok_or_else(|| not_found_error!("User", "auth"))
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> LedgerResult<()> {
        let old_password = request.old_password.as_deref().unwrap_or("");
        let new_password = request.new_password.as_deref().unwrap_or("");
        if old_password.is_empty() || new_password.is_empty() {
            return Err(validation_error!(
                "Old password and new password are required",
                "new_password",
                "auth"
            ));
        }

        let account = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| not_found_error!("User", "auth"))?;

        if !verify_password(old_password, &account.password_hash) {
            return Err(LedgerError::authentication("Old password is incorrect", "auth"));
        }
        self.check_password_strength(new_password, "new_password")?;

        let hash = hash_password(new_password)?;
        self.users.update_password(user_id, &hash).await?;
        info!(user_id, "Password changed");
        Ok(())
    }

    /// Create the configured bootstrap admin if it does not exist yet
    pub async fn ensure_bootstrap_admin(&self, username: &str, password: &str) -> LedgerResult<bool> {
        if self.users.exists(username).await? {
            return Ok(false);
        }
        let hash = hash_password(password)?;
        self.users.ensure_admin(username, &hash).await
    }
}

/// Hash password using Argon2 with a random salt
pub fn hash_password(password: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::Internal {
            message: format!("Failed to hash password: {}", e),
            source: None,
            context: ErrorContext::new("auth").with_operation("hash_password"),
        })
}

/// Verify password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

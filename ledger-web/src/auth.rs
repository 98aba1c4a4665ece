//! Authentication and authorization
//!
//! Tokens are verified by [`jwt::JwtService`]. Route groups are gated by
//! [`crate::middleware::role_guard`] with a [`RoleSet`]; handlers receive the
//! verified caller through the [`AuthUser`] extractor and apply the
//! ownership rule themselves via [`AuthUser::can_modify`].

pub mod handlers;
pub mod jwt;
pub mod users;

#[cfg(test)]
mod tests;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jwt::{AuthError, Claims, JwtService};
use ledger_core::Role;
use serde::Serialize;

/// Verified caller identity, taken from the token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        Ok(Self {
            id: claims.user_id()?,
            username: claims.username.clone(),
            role: claims.role,
        })
    }

    /// Ownership rule: basic-tier callers may only touch their own records
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.role.bypasses_ownership() || self.id == owner_id
    }

    /// Owner restriction to apply to listings for this caller
    pub fn owner_scope(&self) -> Option<i64> {
        (!self.role.bypasses_ownership()).then_some(self.id)
    }
}

/// Reuses the identity placed by the role guard, or verifies the header itself
impl<S> FromRequestParts<S> for AuthUser
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let jwt = JwtService::from_ref(state);
        let claims = jwt.verify_header(&parts.headers)?;
        AuthUser::from_claims(&claims)
    }
}

/// Set of roles admitted by a route group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    pub const ANY: RoleSet = RoleSet(&[Role::User, Role::PowerUser, Role::Admin]);
    pub const ADMIN_ONLY: RoleSet = RoleSet(&[Role::Admin]);

    pub fn allows(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

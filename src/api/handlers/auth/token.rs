//! Session token signing and verification.
//!
//! Tokens are stateless HS256 JWTs carrying the user id, campus assignment,
//! and role. Verification is pure: it never touches the store, so the guard
//! can run on every request without a lock.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthConfig;
use super::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id the token was issued for.
    pub sub: String,
    /// Campus the bearer is scoped to; absent for super admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus_id: Option<String>,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: &Uuid, campus_id: Option<&Uuid>, role: Role, ttl_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            campus_id: campus_id.map(Uuid::to_string),
            role,
            iat: now,
            exp: now + ttl_seconds,
        }
    }
}

/// Sign a session token for the given user.
///
/// # Errors
/// Returns `Internal` if JWT encoding fails.
pub fn issue(
    config: &AuthConfig,
    user_id: &Uuid,
    campus_id: Option<&Uuid>,
    role: Role,
) -> Result<String, AuthError> {
    let claims = Claims::new(user_id, campus_id, role, config.token_ttl_seconds());
    sign(config, &claims)
}

pub(crate) fn sign(config: &AuthConfig, claims: &Claims) -> Result<String, AuthError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes()),
    )
    .map_err(|err| AuthError::Internal(anyhow::anyhow!("failed to sign session token: {err}")))
}

/// Verify a presented token and return its claims.
///
/// Any failure (tampered, expired, malformed) collapses into
/// `InvalidOrExpiredToken` so callers cannot distinguish the cases.
pub fn verify(config: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidOrExpiredToken)
}

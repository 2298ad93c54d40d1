//! Per-request authorization guard.
//!
//! Handlers call `authenticate` to turn the bearer token into claims, then
//! `authorize_campus` when the request names an explicit target campus.
//! Requests without an explicit target are scoped by the handler itself,
//! which must filter by the claims' campus id.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::error::AuthError;
use super::state::AuthConfig;
use super::token::{self, Claims};
use super::types::Role;

/// Resolve the request's bearer token into verified claims.
///
/// # Errors
/// `MissingToken` when no bearer credential is present,
/// `InvalidOrExpiredToken` when verification fails for any reason.
pub fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> Result<Claims, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::MissingToken)?;
    token::verify(config, &token)
}

/// Enforce the tenant-scoping rule against an explicit target campus.
///
/// Super admins bypass scoping entirely; everyone else may only address their
/// own campus.
pub fn authorize_campus(claims: &Claims, target_campus_id: Option<&str>) -> Result<(), AuthError> {
    if claims.role == Role::SuperAdmin {
        return Ok(());
    }

    let Some(target) = target_campus_id else {
        // No explicit target: downstream handlers filter by the claims' campus.
        return Ok(());
    };

    match claims.campus_id.as_deref() {
        Some(campus_id) if campus_id == target => Ok(()),
        _ => Err(AuthError::CrossTenantAccessDenied),
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

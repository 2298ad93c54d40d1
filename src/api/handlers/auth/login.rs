//! Password login endpoint.

use anyhow::Context;
use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, Credential, UserRecord};
use super::token;
use super::types::{LoginRequest, LoginResponse, SessionUser};
use super::utils::normalize_email;

pub(super) fn session_user(user: &UserRecord) -> SessionUser {
    SessionUser {
        id: user.id.to_string(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        campus_id: user.campus_id.map(|id| id.to_string()),
    }
}

/// Authenticate with email + password and issue a session token.
///
/// "No such user" and "wrong password" are deliberately indistinguishable;
/// both surface as `Invalid credentials`.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials or Google-only account"),
        (status = 500, description = "Store failure")
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(AuthError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = storage::lookup_user_by_email(&pool, &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let password_hash = match &user.credential {
        Credential::Local { password_hash } => password_hash,
        Credential::External { .. } => return Err(AuthError::OAuthOnlyAccount),
    };

    // bcrypt's verify is constant-time over the derived digest.
    let matches =
        bcrypt::verify(&request.password, password_hash).context("failed to verify password")?;
    if !matches {
        return Err(AuthError::InvalidCredentials);
    }

    let token = token::issue(
        auth_state.config(),
        &user.id,
        user.campus_id.as_ref(),
        user.role,
    )?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user: session_user(&user),
    }))
}

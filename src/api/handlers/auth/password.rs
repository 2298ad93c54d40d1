//! Password reset endpoints.

use anyhow::Context;
use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, CodePurpose, ConsumeOutcome, Credential};
use super::types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest};
use super::utils::{normalize_email, valid_email};
use super::verification::issue_code;

const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a password reset code has been sent";

/// Request a password reset code.
///
/// The response is identical whether or not the account exists; the email
/// dispatch is silently skipped for unknown addresses. Google-only accounts
/// are the accepted exception and get an explicit error.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Generic acknowledgement", body = MessageResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Google-only account"),
        (status = 500, description = "Store or mail failure")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("A valid email is required".to_string()));
    }

    let generic = MessageResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
    };

    let Some(user) = storage::lookup_user_by_email(&pool, &email).await? else {
        // Unknown address: same body, no email sent.
        return Ok(Json(generic));
    };

    if matches!(user.credential, Credential::External { .. }) {
        return Err(AuthError::OAuthOnlyAccount);
    }

    issue_code(&pool, &auth_state, &email, CodePurpose::PasswordReset).await?;

    Ok(Json(generic))
}

/// Reset the password with a previously emailed reset code.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid input or code"),
        (status = 500, description = "Store failure")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    let code = request.code.trim();
    if email.is_empty() || code.is_empty() {
        return Err(AuthError::Validation(
            "Email and code are required".to_string(),
        ));
    }
    if request.new_password.chars().count() < 6 {
        return Err(AuthError::WeakPassword);
    }

    match storage::consume_code(&pool, &email, CodePurpose::PasswordReset, code).await? {
        ConsumeOutcome::Consumed => {}
        ConsumeOutcome::NotFound => return Err(AuthError::InvalidOrExpiredCode),
        ConsumeOutcome::Expired => return Err(AuthError::CodeExpired),
    }

    // A valid code implies the account existed when it was issued, but it may
    // have been removed since.
    let user = storage::lookup_user_by_email(&pool, &email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let password_hash = bcrypt::hash(&request.new_password, auth_state.config().bcrypt_cost())
        .context("failed to hash password")?;
    storage::update_password_hash(&pool, &user.id, &password_hash).await?;

    Ok(Json(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}

//! One-time verification code issuing.

use anyhow::Context;
use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::email::{password_reset_email, verification_code_email};

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, CodePurpose};
use super::types::{CodeRequestedResponse, RequestCodeRequest};
use super::utils::{generate_code, normalize_email, valid_email};

/// Generate, persist, and dispatch a one-time code for (email, purpose).
///
/// The delete-then-insert and the mail dispatch share one transaction: a new
/// code supersedes any unconsumed predecessor, and a failed send rolls the
/// fresh code back so no stale valid code lingers.
pub(super) async fn issue_code(
    pool: &PgPool,
    auth_state: &AuthState,
    email: &str,
    purpose: CodePurpose,
) -> Result<(), AuthError> {
    let code = generate_code();
    let (ttl_seconds, mail) = match purpose {
        CodePurpose::Registration => (
            auth_state.config().registration_code_ttl_seconds(),
            verification_code_email(email, &code),
        ),
        CodePurpose::PasswordReset => (
            auth_state.config().reset_code_ttl_seconds(),
            password_reset_email(email, &code),
        ),
    };

    let mut tx = pool.begin().await.context("begin code transaction")?;
    storage::replace_code(&mut tx, email, purpose, &code, ttl_seconds).await?;

    if let Err(err) = auth_state.mailer().send(&mail).await {
        let _ = tx.rollback().await;
        return Err(AuthError::Internal(
            err.context("failed to dispatch one-time code email"),
        ));
    }

    tx.commit().await.context("commit code transaction")?;
    Ok(())
}

/// Email a registration verification code.
#[utoipa::path(
    post,
    path = "/auth/request-verification-code",
    request_body = RequestCodeRequest,
    responses(
        (status = 200, description = "Verification code sent", body = CodeRequestedResponse),
        (status = 400, description = "Invalid email or already registered"),
        (status = 500, description = "Store or mail failure")
    ),
    tag = "auth"
)]
pub async fn request_verification_code(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestCodeRequest>>,
) -> Result<(StatusCode, Json<CodeRequestedResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::Validation("A valid email is required".to_string()));
    }

    if storage::user_exists(&pool, &email).await? {
        return Err(AuthError::AlreadyRegistered);
    }

    issue_code(&pool, &auth_state, &email, CodePurpose::Registration).await?;

    Ok((
        StatusCode::OK,
        Json(CodeRequestedResponse {
            message: "Verification code sent".to_string(),
            email,
        }),
    ))
}

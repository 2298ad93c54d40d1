//! Registration endpoint.

use anyhow::Context;
use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{self, CodePurpose, ConsumeOutcome, Credential, InsertOutcome, NewUser};
use super::types::{RegisterRequest, RegisterResponse, RegisteredUser, Role};
use super::utils::{email_domain, normalize_email, valid_email};

/// Register a new account with a previously emailed verification code.
///
/// Roles are server-assigned: allow-listed emails become campus-less
/// `super_admin`, everyone else becomes a `student` pinned to the campus
/// whose domain matches their email. Client-supplied roles are not accepted.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = RegisterResponse),
        (status = 400, description = "Invalid input, code, campus, or duplicate account"),
        (status = 500, description = "Store failure")
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("Missing payload".to_string()));
    };

    let name = request.name.trim();
    let email = normalize_email(&request.email);
    let code = request.verification_code.trim();
    if name.is_empty() || email.is_empty() || request.password.is_empty() || code.is_empty() {
        return Err(AuthError::Validation("All fields are required".to_string()));
    }
    if !valid_email(&email) {
        return Err(AuthError::Validation("A valid email is required".to_string()));
    }
    if request.password.chars().count() < 6 {
        return Err(AuthError::WeakPassword);
    }

    let is_admin = auth_state.config().is_admin_email(&email);
    let campus_id = if is_admin {
        // Allow-listed admins are campus-less; any supplied campus is ignored.
        None
    } else {
        let raw = request
            .campus_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AuthError::Validation("All fields are required, including campus".to_string())
            })?;
        Some(Uuid::parse_str(raw).map_err(|_| AuthError::InvalidTenant)?)
    };

    // Consume the code before any other side effect; failure aborts cleanly.
    match storage::consume_code(&pool, &email, CodePurpose::Registration, code).await? {
        ConsumeOutcome::Consumed => {}
        ConsumeOutcome::NotFound => return Err(AuthError::InvalidOrExpiredCode),
        ConsumeOutcome::Expired => return Err(AuthError::CodeExpired),
    }

    if storage::user_exists(&pool, &email).await? {
        return Err(AuthError::DuplicateAccount);
    }

    let campus = match campus_id {
        Some(id) => {
            let campus = storage::campus_by_id(&pool, &id)
                .await?
                .ok_or(AuthError::InvalidTenant)?;
            let domain = email_domain(&email)
                .ok_or_else(|| AuthError::Validation("A valid email is required".to_string()))?;
            if domain != campus.email_domain {
                return Err(AuthError::DomainMismatch {
                    domain: campus.email_domain,
                    campus: campus.name,
                });
            }
            Some(campus)
        }
        None => None,
    };

    let role = if is_admin { Role::SuperAdmin } else { Role::Student };
    let password_hash = bcrypt::hash(&request.password, auth_state.config().bcrypt_cost())
        .context("failed to hash password")?;

    let outcome = storage::insert_user(
        &pool,
        NewUser {
            name,
            email: &email,
            credential: Credential::Local { password_hash },
            role,
            campus_id: campus.as_ref().map(|campus| campus.id),
        },
    )
    .await?;
    let user = match outcome {
        InsertOutcome::Created(user) => user,
        InsertOutcome::Conflict => return Err(AuthError::DuplicateAccount),
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: RegisteredUser {
                id: user.id.to_string(),
                name: user.name,
                email: user.email,
                role: user.role,
                campus: campus.map(|campus| campus.name),
            },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::state::{AuthConfig, AuthState, OAuthState};
    use super::{register, RegisterRequest};
    use crate::api::email::LogMailer;
    use crate::api::handlers::auth::error::AuthError;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::Json;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            "https://nexus.campus".to_string(),
            SecretString::from("test-secret".to_string()),
        );
        let oauth = OAuthState::new(None, Duration::from_secs(30));
        Arc::new(AuthState::new(config, oauth, Arc::new(LogMailer)))
    }

    fn request() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@iitb.ac.in".to_string(),
            password: "hunter42".to_string(),
            verification_code: "123456".to_string(),
            campus_id: Some("6a8e0a20-6f3e-4f3a-9c1a-0a4de3f2b111".to_string()),
        }
    }

    #[tokio::test]
    async fn missing_payload_is_rejected() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = register(Extension(pool), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn short_password_is_rejected() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = register(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                password: "12345".to_string(),
                ..request()
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::WeakPassword)));
        Ok(())
    }

    #[tokio::test]
    async fn missing_campus_is_rejected_for_non_admins() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = register(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                campus_id: None,
                ..request()
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_campus_id_is_invalid_tenant() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = register(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                campus_id: Some("not-a-uuid".to_string()),
                ..request()
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidTenant)));
        Ok(())
    }
}

//! Current-user profile endpoint.

use axum::{extract::Extension, http::HeaderMap, Json};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;
use super::guard;
use super::login::session_user;
use super::state::AuthState;
use super::storage;
use super::types::SessionUser;

/// Return the authenticated caller's profile.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = SessionUser),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Store failure")
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<SessionUser>, AuthError> {
    let claims = guard::authenticate(&headers, auth_state.config())?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidOrExpiredToken)?;

    let user = storage::lookup_user_by_id(&pool, &user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(session_user(&user)))
}

#[cfg(test)]
mod tests {
    use super::super::state::{AuthConfig, AuthState, OAuthState};
    use super::me;
    use crate::api::email::LogMailer;
    use crate::api::handlers::auth::error::AuthError;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::HeaderMap;
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

    #[tokio::test]
    async fn missing_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = me(HeaderMap::new(), Extension(pool), Extension(auth_state())).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer nope"),
        );
        let result = me(headers, Extension(pool), Extension(auth_state())).await;
        assert!(matches!(result, Err(AuthError::InvalidOrExpiredToken)));
        Ok(())
    }
}

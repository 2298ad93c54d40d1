//! Campus directory endpoints.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::error::AuthError;
use super::auth::guard;
use super::auth::state::AuthState;
use super::auth::storage::{self, CampusRecord};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CampusResponse {
    pub id: String,
    pub name: String,
    pub short_code: String,
    pub email_domain: String,
}

fn campus_response(campus: CampusRecord) -> CampusResponse {
    CampusResponse {
        id: campus.id.to_string(),
        name: campus.name,
        short_code: campus.short_code,
        email_domain: campus.email_domain,
    }
}

/// List all campuses. Public: the registration form needs it before login.
#[utoipa::path(
    get,
    path = "/campuses",
    responses(
        (status = 200, description = "All campuses", body = [CampusResponse]),
        (status = 500, description = "Store failure")
    ),
    tag = "campuses"
)]
pub async fn list_campuses(
    pool: Extension<PgPool>,
) -> Result<Json<Vec<CampusResponse>>, AuthError> {
    let campuses = storage::list_campuses(&pool).await?;
    Ok(Json(campuses.into_iter().map(campus_response).collect()))
}

/// Campus detail, scoped to the caller's own campus unless they are a
/// super admin.
#[utoipa::path(
    get,
    path = "/campuses/{campus_id}",
    params(
        ("campus_id" = String, Path, description = "Campus id")
    ),
    responses(
        (status = 200, description = "Campus detail", body = CampusResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Campus outside the caller's scope"),
        (status = 500, description = "Store failure")
    ),
    tag = "campuses"
)]
pub async fn campus_detail(
    headers: HeaderMap,
    Path(campus_id): Path<String>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<CampusResponse>, AuthError> {
    let claims = guard::authenticate(&headers, auth_state.config())?;

    let id = Uuid::parse_str(campus_id.trim()).map_err(|_| AuthError::InvalidTenant)?;
    // Compare on the canonical form so casing differences cannot slip through.
    guard::authorize_campus(&claims, Some(&id.to_string()))?;

    let campus = storage::campus_by_id(&pool, &id)
        .await?
        .ok_or(AuthError::InvalidTenant)?;

    Ok(Json(campus_response(campus)))
}

#[cfg(test)]
mod tests {
    use super::super::auth::state::{AuthConfig, AuthState, OAuthState};
    use super::super::auth::token;
    use super::super::auth::types::Role;
    use super::{campus_detail, campus_response};
    use crate::api::email::LogMailer;
    use crate::api::handlers::auth::error::AuthError;
    use crate::api::handlers::auth::storage::CampusRecord;
    use anyhow::Result;
    use axum::extract::{Extension, Path};
    use axum::http::{HeaderMap, HeaderValue};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            "https://nexus.campus".to_string(),
            SecretString::from("test-secret".to_string()),
        );
        let oauth = OAuthState::new(None, Duration::from_secs(30));
        Arc::new(AuthState::new(config, oauth, Arc::new(LogMailer)))
    }

    #[test]
    fn campus_response_uses_camel_case() -> Result<()> {
        let response = campus_response(CampusRecord {
            id: Uuid::new_v4(),
            name: "IIT Bombay".to_string(),
            short_code: "IITB".to_string(),
            email_domain: "iitb.ac.in".to_string(),
        });
        let value = serde_json::to_value(&response)?;
        assert!(value.get("shortCode").is_some());
        assert!(value.get("emailDomain").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn detail_requires_a_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = campus_detail(
            HeaderMap::new(),
            Path(Uuid::new_v4().to_string()),
            Extension(pool),
            Extension(auth_state()),
        )
        .await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
        Ok(())
    }

    #[tokio::test]
    async fn detail_denies_foreign_campus() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let own_campus = Uuid::new_v4();
        let token = token::issue(
            state.config(),
            &Uuid::new_v4(),
            Some(&own_campus),
            Role::Student,
        )
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let result = campus_detail(
            headers,
            Path(Uuid::new_v4().to_string()),
            Extension(pool),
            Extension(state),
        )
        .await;
        assert!(matches!(result, Err(AuthError::CrossTenantAccessDenied)));
        Ok(())
    }
}

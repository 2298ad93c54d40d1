//! Google sign-in endpoints.
//!
//! The consent redirect and the callback are stateless from the client's
//! point of view; the CSRF state and PKCE verifier for in-flight logins live
//! in an in-memory TTL map on `OAuthState`. The provider's identity assertion
//! is trusted completely: no additional verification is performed beyond the
//! code exchange itself.

use anyhow::{anyhow, Context};
use axum::{
    extract::{Extension, Query},
    response::Redirect,
};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use url::form_urlencoded;

use super::error::AuthError;
use super::login::session_user;
use super::state::{AuthState, GoogleConfig};
use super::storage::{self, Credential, InsertOutcome, NewUser, UserRecord};
use super::token;
use super::types::{Role, SessionUser};
use super::utils::{email_domain, email_local_part, normalize_email, valid_email};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const AUTH_FAILED_MESSAGE: &str = "Google authentication failed. Please try again.";

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Identity assertion returned by the provider's userinfo endpoint.
#[derive(Deserialize, Debug)]
pub(super) struct ExternalProfile {
    pub(super) email: Option<String>,
    pub(super) name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct GoogleCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn google_client(config: &GoogleConfig) -> Result<GoogleClient, AuthError> {
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
        .map_err(|err| AuthError::Internal(anyhow!("invalid authorization URL: {err}")))?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
        .map_err(|err| AuthError::Internal(anyhow!("invalid token URL: {err}")))?;
    let redirect_url = RedirectUrl::new(config.callback_url.clone())
        .map_err(|err| AuthError::Internal(anyhow!("invalid callback URL: {err}")))?;

    Ok(
        BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(
                config.client_secret.expose_secret().to_string(),
            ))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url),
    )
}

/// Redirect the client to Google's consent screen.
#[utoipa::path(
    get,
    path = "/auth/google",
    responses(
        (status = 307, description = "Redirect to the provider consent screen"),
        (status = 500, description = "Google sign-in not configured")
    ),
    tag = "auth"
)]
pub async fn google_login(
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Redirect, AuthError> {
    let google = auth_state
        .oauth()
        .google()
        .ok_or_else(|| AuthError::Internal(anyhow!("Google sign-in is not configured")))?;
    let client = google_client(google)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .set_pkce_challenge(pkce_challenge)
        .url();

    auth_state
        .oauth()
        .store_pending(
            csrf_token.secret().clone(),
            pkce_verifier.secret().clone(),
        )
        .await;

    Ok(Redirect::temporary(auth_url.as_str()))
}

/// Handle the provider callback and redirect back to the frontend.
///
/// Success and failure are both redirects: the frontend receives either
/// `?token=…&user=…` on its callback route or `?error=…` on its error route.
#[utoipa::path(
    get,
    path = "/auth/google/callback",
    responses(
        (status = 307, description = "Redirect to the frontend with a token or an error")
    ),
    tag = "auth"
)]
pub async fn google_callback(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Redirect {
    let frontend = auth_state.config().frontend_base_url();
    match callback_flow(&pool, &auth_state, query).await {
        Ok((token, user)) => success_redirect(frontend, &token, &user)
            .unwrap_or_else(|_| error_redirect(frontend, "Server error during Google login")),
        Err(err) => error_redirect(frontend, &err.to_string()),
    }
}

async fn callback_flow(
    pool: &PgPool,
    auth_state: &AuthState,
    query: GoogleCallbackQuery,
) -> Result<(String, SessionUser), AuthError> {
    if query.error.is_some() {
        return Err(AuthError::Validation(AUTH_FAILED_MESSAGE.to_string()));
    }
    let google = auth_state
        .oauth()
        .google()
        .ok_or_else(|| AuthError::Internal(anyhow!("Google sign-in is not configured")))?;

    let (code, state) = match (query.code, query.state) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => (code, state),
        _ => return Err(AuthError::Validation(AUTH_FAILED_MESSAGE.to_string())),
    };

    // Unknown or stale state: either CSRF or an expired login attempt.
    let pkce_verifier = auth_state
        .oauth()
        .take_pending(&state)
        .await
        .ok_or_else(|| AuthError::Validation(AUTH_FAILED_MESSAGE.to_string()))?;

    let client = google_client(google)?;
    let http_client = reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("failed to create HTTP client")?;

    let token_response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await
        .map_err(|err| AuthError::Internal(anyhow!("token exchange failed: {err}")))?;

    let profile: ExternalProfile = http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token_response.access_token().secret())
        .send()
        .await
        .context("userinfo request failed")?
        .error_for_status()
        .context("userinfo request rejected")?
        .json()
        .await
        .context("invalid userinfo payload")?;

    oauth_login(pool, auth_state, profile).await
}

/// Resolve an external identity assertion into a local account and token.
///
/// First login creates the account (no password hash); an existing account
/// that is newly on the admin allow-list is promoted in place.
pub(super) async fn oauth_login(
    pool: &PgPool,
    auth_state: &AuthState,
    profile: ExternalProfile,
) -> Result<(String, SessionUser), AuthError> {
    let email = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| valid_email(email))
        .ok_or(AuthError::InvalidExternalProfile)?;
    let name = profile
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| email_local_part(&email).to_string());

    let is_admin = auth_state.config().is_admin_email(&email);
    let campus = if is_admin {
        None
    } else {
        let domain = email_domain(&email).ok_or(AuthError::InvalidExternalProfile)?;
        Some(
            storage::campus_by_domain(pool, domain)
                .await?
                .ok_or(AuthError::UnregisteredDomain)?,
        )
    };

    let user = match storage::lookup_user_by_email(pool, &email).await? {
        Some(user) => {
            if is_admin && user.role != Role::SuperAdmin {
                storage::promote_to_super_admin(pool, &user.id).await?;
                UserRecord {
                    role: Role::SuperAdmin,
                    campus_id: None,
                    ..user
                }
            } else {
                user
            }
        }
        None => {
            let role = if is_admin { Role::SuperAdmin } else { Role::Student };
            let outcome = storage::insert_user(
                pool,
                NewUser {
                    name: &name,
                    email: &email,
                    credential: Credential::External {
                        provider: "google".to_string(),
                    },
                    role,
                    campus_id: campus.as_ref().map(|campus| campus.id),
                },
            )
            .await?;
            match outcome {
                InsertOutcome::Created(user) => user,
                // Lost a race with a concurrent first login; use the winner's row.
                InsertOutcome::Conflict => storage::lookup_user_by_email(pool, &email)
                    .await?
                    .ok_or_else(|| {
                        AuthError::Internal(anyhow!("account vanished after insert conflict"))
                    })?,
            }
        }
    };

    let token = token::issue(
        auth_state.config(),
        &user.id,
        user.campus_id.as_ref(),
        user.role,
    )?;
    Ok((token, session_user(&user)))
}

fn success_redirect(
    frontend_base_url: &str,
    token: &str,
    user: &SessionUser,
) -> Result<Redirect, AuthError> {
    let user_json = serde_json::to_string(user).context("failed to serialize user payload")?;
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("user", &user_json)
        .finish();
    let base = frontend_base_url.trim_end_matches('/');
    Ok(Redirect::temporary(&format!("{base}/auth/callback?{query}")))
}

fn error_redirect(frontend_base_url: &str, message: &str) -> Redirect {
    let encoded: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
    let base = frontend_base_url.trim_end_matches('/');
    Redirect::temporary(&format!("{base}/auth/error?error={encoded}"))
}

//! Domain error taxonomy shared by every auth endpoint.
//!
//! Each variant maps to a stable HTTP status and a caller-facing message.
//! Store or mail failures are wrapped in `Internal`, logged, and surfaced as a
//! generic 500 so no internal detail leaks.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("An account with this email already exists")]
    AlreadyRegistered,
    #[error("User already exists")]
    DuplicateAccount,
    #[error("Invalid campus selected")]
    InvalidTenant,
    #[error("Email must belong to {domain} for {campus}")]
    DomainMismatch { domain: String, campus: String },
    #[error("Your email domain is not registered with any campus")]
    UnregisteredDomain,
    #[error("Invalid or expired verification code")]
    InvalidOrExpiredCode,
    #[error("Verification code has expired, please request a new one")]
    CodeExpired,
    #[error("Password must be at least 6 characters long")]
    WeakPassword,
    #[error("No account found for this email")]
    UserNotFound,
    #[error("Invalid Google profile data. Email is required.")]
    InvalidExternalProfile,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("This account uses Google sign-in. Please log in with Google.")]
    OAuthOnlyAccount,
    #[error("No token, authorization denied")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidOrExpiredToken,
    #[error("Access to this campus is restricted")]
    CrossTenantAccessDenied,
    #[error("Server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::AlreadyRegistered
            | Self::DuplicateAccount
            | Self::InvalidTenant
            | Self::DomainMismatch { .. }
            | Self::UnregisteredDomain
            | Self::InvalidOrExpiredCode
            | Self::CodeExpired
            | Self::WeakPassword
            | Self::UserNotFound
            | Self::InvalidExternalProfile => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::OAuthOnlyAccount
            | Self::MissingToken
            | Self::InvalidOrExpiredToken => StatusCode::UNAUTHORIZED,
            Self::CrossTenantAccessDenied => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref err) = self {
            error!("internal error: {err:?}");
        }
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn validation_errors_are_bad_request() {
        assert_eq!(
            AuthError::Validation("Email is required".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::WeakPassword.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::CodeExpired.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn credential_errors_are_unauthorized() {
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InvalidOrExpiredToken.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn cross_tenant_access_is_forbidden() {
        assert_eq!(
            AuthError::CrossTenantAccessDenied.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn internal_errors_hide_their_source() {
        let err = AuthError::Internal(anyhow!("connection refused"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Server error");
    }

    #[test]
    fn domain_mismatch_names_the_campus() {
        let err = AuthError::DomainMismatch {
            domain: "iitb.ac.in".to_string(),
            campus: "IIT Bombay".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Email must belong to iitb.ac.in for IIT Bombay"
        );
    }

    #[test]
    fn into_response_sets_status() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

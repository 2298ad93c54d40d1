//! `OpenAPI` document for the HTTP surface.
//!
//! Routes are registered in `api::new`; this document is generated from the
//! `#[utoipa::path]` annotations and printed by the `openapi` binary.

use utoipa::OpenApi;

use crate::api::handlers::{auth, campuses, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        campuses::list_campuses,
        campuses::campus_detail,
        auth::verification::request_verification_code,
        auth::register::register,
        auth::login::login,
        auth::password::forgot_password,
        auth::password::reset_password,
        auth::oauth::google_login,
        auth::oauth::google_callback,
        auth::me::me,
    ),
    components(schemas(
        auth::types::Role,
        auth::types::RequestCodeRequest,
        auth::types::CodeRequestedResponse,
        auth::types::RegisterRequest,
        auth::types::RegisterResponse,
        auth::types::RegisteredUser,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::SessionUser,
        auth::types::ForgotPasswordRequest,
        auth::types::ResetPasswordRequest,
        auth::types::MessageResponse,
        campuses::CampusResponse,
    )),
    tags(
        (name = "auth", description = "Registration, login, and password recovery"),
        (name = "campuses", description = "Campus directory"),
        (name = "health", description = "Service status"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn document_lists_the_auth_surface() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/campuses",
            "/campuses/{campus_id}",
            "/auth/request-verification-code",
            "/auth/register",
            "/auth/login",
            "/auth/forgot-password",
            "/auth/reset-password",
            "/auth/google",
            "/auth/google/callback",
            "/auth/me",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}

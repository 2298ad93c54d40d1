//! # Nexus Auth (campus identity & access)
//!
//! `nexus-auth` is the identity layer for the campus platform. It registers
//! users with emailed one-time verification codes, authenticates them with a
//! password or Google sign-in, and issues signed session tokens that carry the
//! caller's campus assignment.
//!
//! ## Tenant model (campuses)
//!
//! Campuses are the tenant boundary. Each campus owns an email domain, and the
//! domain is authoritative: a user is assigned to the campus whose domain
//! matches their email address at registration time.
//!
//! - **Roles:** `student`, `club_admin`, `campus_admin`, `super_admin`.
//!   Super admins are campus-less and bypass tenant scoping; all other roles
//!   are pinned to their campus.
//! - **Admin allow-list:** email addresses on the configured allow-list are
//!   promoted to `super_admin` on registration or Google sign-in.
//!
//! ## Authentication
//!
//! Passwords are stored as salted bcrypt hashes and never in plaintext.
//! Google sign-in trusts the provider's identity assertion; those accounts
//! carry no password hash. Session tokens are stateless HS256 JWTs valid for
//! 24 hours; there is no revocation store.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}

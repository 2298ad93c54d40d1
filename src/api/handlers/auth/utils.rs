//! Small helpers for auth validation and one-time code handling.

use rand::Rng;
use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Domain part of a normalized email, used for campus assignment.
pub(crate) fn email_domain(email_normalized: &str) -> Option<&str> {
    email_normalized
        .split_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

/// Local part of a normalized email, used as a display-name fallback.
pub(crate) fn email_local_part(email_normalized: &str) -> &str {
    email_normalized
        .split_once('@')
        .map_or(email_normalized, |(local, _)| local)
}

/// Uniformly random 6-digit one-time code.
pub(crate) fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

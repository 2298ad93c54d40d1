//! Database helpers for users, campuses, and one-time codes.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use super::types::Role;
use super::utils::is_unique_violation;

/// How an account proves its identity. External accounts carry no password
/// hash; the provider's assertion is trusted instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    Local { password_hash: String },
    External { provider: String },
}

impl Credential {
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Local { .. } => "local",
            Self::External { provider } => provider,
        }
    }

    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Self::Local { password_hash } => Some(password_hash),
            Self::External { .. } => None,
        }
    }
}

/// Rebuild the credential variant from its column encoding, rejecting rows
/// that violate the "local accounts always have a hash" invariant.
pub(super) fn credential_from_columns(
    provider: &str,
    password_hash: Option<String>,
) -> Result<Credential> {
    match provider {
        "local" => password_hash
            .map(|password_hash| Credential::Local { password_hash })
            .ok_or_else(|| anyhow!("local account is missing its password hash")),
        external => Ok(Credential::External {
            provider: external.to_string(),
        }),
    }
}

#[derive(Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub campus_id: Option<Uuid>,
    pub credential: Credential,
}

#[derive(Debug)]
pub struct CampusRecord {
    pub id: Uuid,
    pub name: String,
    pub short_code: String,
    pub email_domain: String,
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub credential: Credential,
    pub role: Role,
    pub campus_id: Option<Uuid>,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(UserRecord),
    Conflict,
}

/// Outcome when attempting to consume a one-time code.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    NotFound,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodePurpose {
    Registration,
    PasswordReset,
}

impl CodePurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::PasswordReset => "password_reset",
        }
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in users row: {role}"))?;
    let provider: String = row.get("auth_provider");
    let credential = credential_from_columns(&provider, row.get("password_hash"))?;
    Ok(UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        campus_id: row.get("campus_id"),
        credential,
    })
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, name, email, password_hash, auth_provider, role, campus_id \
                 FROM users WHERE email = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    row.as_ref().map(user_from_row).transpose()
}

pub(super) async fn lookup_user_by_id(pool: &PgPool, id: &Uuid) -> Result<Option<UserRecord>> {
    let query = "SELECT id, name, email, password_hash, auth_provider, role, campus_id \
                 FROM users WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    row.as_ref().map(user_from_row).transpose()
}

pub(super) async fn user_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let query = "SELECT 1 FROM users WHERE email = $1 LIMIT 1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check user existence")?;
    Ok(row.is_some())
}

pub(super) async fn insert_user(pool: &PgPool, user: NewUser<'_>) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO users (name, email, password_hash, auth_provider, role, campus_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user.name)
        .bind(user.email)
        .bind(user.credential.password_hash())
        .bind(user.credential.provider())
        .bind(user.role.as_str())
        .bind(user.campus_id)
        .fetch_one(pool)
        .instrument(span)
        .await;

    let id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                return Ok(InsertOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    Ok(InsertOutcome::Created(UserRecord {
        id,
        name: user.name.to_string(),
        email: user.email.to_string(),
        role: user.role,
        campus_id: user.campus_id,
        credential: user.credential,
    }))
}

pub(super) async fn update_password_hash(
    pool: &PgPool,
    user_id: &Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password hash")?;
    Ok(())
}

/// Promote an allow-listed account in place: super admins are campus-less.
pub(super) async fn promote_to_super_admin(pool: &PgPool, user_id: &Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET role = 'super_admin',
            campus_id = NULL,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to promote user")?;
    Ok(())
}

fn campus_from_row(row: &PgRow) -> CampusRecord {
    CampusRecord {
        id: row.get("id"),
        name: row.get("name"),
        short_code: row.get("short_code"),
        email_domain: row.get("email_domain"),
    }
}

pub(crate) async fn list_campuses(pool: &PgPool) -> Result<Vec<CampusRecord>> {
    let query = "SELECT id, name, short_code, email_domain FROM campuses ORDER BY name";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list campuses")?;
    Ok(rows.iter().map(campus_from_row).collect())
}

pub(crate) async fn campus_by_id(pool: &PgPool, id: &Uuid) -> Result<Option<CampusRecord>> {
    let query = "SELECT id, name, short_code, email_domain FROM campuses WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup campus by id")?;
    Ok(row.as_ref().map(campus_from_row))
}

pub(super) async fn campus_by_domain(
    pool: &PgPool,
    email_domain: &str,
) -> Result<Option<CampusRecord>> {
    let query = "SELECT id, name, short_code, email_domain FROM campuses \
                 WHERE email_domain = $1 LIMIT 1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email_domain)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup campus by domain")?;
    Ok(row.as_ref().map(campus_from_row))
}

/// Replace any unconsumed code for (email, purpose) with a fresh one.
///
/// Runs inside the caller's transaction so the delete-then-insert pair is
/// atomic with respect to concurrent issuers, and so the caller can roll the
/// new code back if mail dispatch fails.
pub(super) async fn replace_code(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    email: &str,
    purpose: CodePurpose,
    code: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        DELETE FROM one_time_codes
        WHERE email = $1
          AND purpose = $2
          AND consumed_at IS NULL
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(purpose.as_str())
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to delete superseded codes")?;

    let query = r"
        INSERT INTO one_time_codes (email, purpose, code, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(purpose.as_str())
        .bind(code)
        .bind(ttl_seconds)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert one-time code")?;

    Ok(())
}

/// Consume a matching unconsumed code.
///
/// The `consumed_at IS NULL` predicate makes the update atomic: of two
/// concurrent consumers, exactly one wins. Codes found past their expiry are
/// deleted on the spot.
pub(super) async fn consume_code(
    pool: &PgPool,
    email: &str,
    purpose: CodePurpose,
    code: &str,
) -> Result<ConsumeOutcome> {
    let query = r"
        UPDATE one_time_codes
        SET consumed_at = NOW()
        WHERE email = $1
          AND purpose = $2
          AND code = $3
          AND consumed_at IS NULL
        RETURNING id, expires_at
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(purpose.as_str())
        .bind(code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume one-time code")?;

    let Some(row) = row else {
        return Ok(ConsumeOutcome::NotFound);
    };

    let expires_at: DateTime<Utc> = row.get("expires_at");
    if expires_at <= Utc::now() {
        let id: Uuid = row.get("id");
        let query = "DELETE FROM one_time_codes WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to delete expired code")?;
        return Ok(ConsumeOutcome::Expired);
    }

    Ok(ConsumeOutcome::Consumed)
}

pub(crate) async fn delete_expired_codes(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM one_time_codes WHERE expires_at <= NOW()";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete expired codes")?;
    Ok(result.rows_affected())
}

/// Spawn a background task that periodically removes stale one-time codes.
/// Expiry is also checked on consumption, so the sweep only reclaims rows.
pub fn spawn_code_sweeper(pool: PgPool, interval_seconds: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_seconds.max(1));
        loop {
            if let Err(err) = delete_expired_codes(&pool).await {
                error!("one-time code sweep failed: {err}");
            }

            sleep(interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_purpose_column_values() {
        assert_eq!(CodePurpose::Registration.as_str(), "registration");
        assert_eq!(CodePurpose::PasswordReset.as_str(), "password_reset");
    }

    #[test]
    fn credential_columns_round_trip() {
        let local = credential_from_columns("local", Some("$2b$10$hash".to_string()))
            .expect("local credential");
        assert_eq!(local.provider(), "local");
        assert_eq!(local.password_hash(), Some("$2b$10$hash"));

        let external = credential_from_columns("google", None).expect("external credential");
        assert_eq!(external.provider(), "google");
        assert_eq!(external.password_hash(), None);
    }

    #[test]
    fn local_credential_requires_hash() {
        assert!(credential_from_columns("local", None).is_err());
    }

    #[test]
    fn external_credential_ignores_stray_hash() {
        let credential = credential_from_columns("google", Some("stale".to_string()))
            .expect("external credential");
        assert_eq!(credential, Credential::External {
            provider: "google".to_string()
        });
    }

    #[test]
    fn consume_outcome_debug_names() {
        assert_eq!(format!("{:?}", ConsumeOutcome::Consumed), "Consumed");
        assert_eq!(format!("{:?}", ConsumeOutcome::NotFound), "NotFound");
        assert_eq!(format!("{:?}", ConsumeOutcome::Expired), "Expired");
    }

}

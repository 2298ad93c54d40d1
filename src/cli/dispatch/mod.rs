//! Command-line argument dispatch and server initialization.
//!
//! Parses validated CLI arguments and maps them to the appropriate action,
//! such as starting the API server with its full configuration.

use crate::api::email::SmtpConfig;
use crate::api::handlers::auth::state::GoogleConfig;
use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;
    let frontend_url = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .unwrap_or_else(|| "http://localhost:5173".to_string());
    let admin_emails = matches
        .get_one::<String>("admin-emails")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let bcrypt_cost = matches.get_one::<u32>("bcrypt-cost").copied().unwrap_or(10);

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        frontend_url,
        admin_emails,
        bcrypt_cost,
        google: google_config(matches)?,
        smtp: smtp_config(matches)?,
    }))
}

/// Google sign-in is optional; when enabled, all three arguments are required.
fn google_config(matches: &clap::ArgMatches) -> Result<Option<GoogleConfig>> {
    let Some(client_id) = matches.get_one::<String>("google-client-id").cloned() else {
        return Ok(None);
    };
    let client_secret = matches
        .get_one::<String>("google-client-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --google-client-secret")?;
    let callback_url = matches
        .get_one::<String>("google-callback-url")
        .cloned()
        .context("missing required argument: --google-callback-url")?;
    Ok(Some(GoogleConfig {
        client_id,
        client_secret,
        callback_url,
    }))
}

/// SMTP delivery is optional; without a host, outbound mail is logged instead.
fn smtp_config(matches: &clap::ArgMatches) -> Result<Option<SmtpConfig>> {
    let Some(host) = matches.get_one::<String>("smtp-host").cloned() else {
        return Ok(None);
    };
    let from = matches
        .get_one::<String>("smtp-from")
        .cloned()
        .context("missing required argument: --smtp-from")?;
    let username = matches.get_one::<String>("smtp-username").cloned();
    let password = matches
        .get_one::<String>("smtp-password")
        .cloned()
        .map(SecretString::from);
    Ok(Some(SmtpConfig {
        host,
        username,
        password,
        from,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("NEXUS_DSN", Some("postgres://localhost:5432/nexus")),
                ("NEXUS_JWT_SECRET", Some("s3cret")),
                ("NEXUS_ADMIN_EMAILS", Some("Root@Gmail.com, ,ops@gmail.com")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["nexus-auth"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                let Ok(Action::Server(args)) = action else {
                    panic!("expected server action");
                };
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://localhost:5432/nexus");
                assert_eq!(args.jwt_secret.expose_secret(), "s3cret");
                assert_eq!(
                    args.admin_emails,
                    vec!["Root@Gmail.com".to_string(), "ops@gmail.com".to_string()]
                );
                assert!(args.google.is_none());
                assert!(args.smtp.is_none());
            },
        );
    }

    #[test]
    fn google_callback_url_required() {
        temp_env::with_vars(
            [
                ("NEXUS_DSN", Some("postgres://localhost:5432/nexus")),
                ("NEXUS_JWT_SECRET", Some("s3cret")),
                ("NEXUS_GOOGLE_CLIENT_ID", Some("client-id")),
                ("NEXUS_GOOGLE_CLIENT_SECRET", Some("client-secret")),
                ("NEXUS_GOOGLE_CALLBACK_URL", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["nexus-auth"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --google-callback-url"));
                }
            },
        );
    }

    #[test]
    fn smtp_from_required_with_host() {
        temp_env::with_vars(
            [
                ("NEXUS_DSN", Some("postgres://localhost:5432/nexus")),
                ("NEXUS_JWT_SECRET", Some("s3cret")),
                ("NEXUS_SMTP_HOST", Some("smtp.gmail.com")),
                ("NEXUS_SMTP_FROM", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["nexus-auth"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --smtp-from"));
                }
            },
        );
    }
}

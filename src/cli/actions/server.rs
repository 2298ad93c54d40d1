use crate::api;
use crate::api::email::SmtpConfig;
use crate::api::handlers::auth::state::{AuthConfig, GoogleConfig};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub frontend_url: String,
    pub admin_emails: Vec<String>,
    pub bcrypt_cost: u32,
    pub google: Option<GoogleConfig>,
    pub smtp: Option<SmtpConfig>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = AuthConfig::new(args.frontend_url, args.jwt_secret)
        .with_admin_emails(args.admin_emails)
        .with_bcrypt_cost(args.bcrypt_cost);

    api::new(args.port, args.dsn, config, args.google, args.smtp).await
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        frontend_url = %args.frontend_url,
        admin_emails = args.admin_emails.len(),
        google_sign_in = args.google.is_some(),
        smtp_delivery = args.smtp.is_some(),
        "starting server"
    );
}

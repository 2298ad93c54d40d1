//! Outbound mail delivery.
//!
//! One-time codes must reach the user before the issuing request is
//! confirmed, so delivery is awaited inline: the verification service sends
//! inside its transaction and rolls the code back if the send fails.
//!
//! The `Mailer` trait keeps delivery pluggable. `SmtpMailer` relays through a
//! configured SMTP host; `LogMailer` is the local-dev fallback that logs the
//! payload and reports success.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

#[derive(Clone, Debug)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Email delivery abstraction used by the verification service.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error so the caller can roll back.
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Build a TLS relay transport for the configured host.
    ///
    /// # Errors
    /// Returns an error if the relay host is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("failed to configure SMTP relay")?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(email.to.parse().context("invalid recipient address")?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .context("failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("failed to send email")?;
        Ok(())
    }
}

#[must_use]
pub fn verification_code_email(to: &str, code: &str) -> OutboundEmail {
    let html_body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <h2 style="color: #333;">Email Verification</h2>
    <p>Thank you for registering with Nexus!</p>
    <p>Your verification code is:</p>
    <div style="background-color: #f4f4f4; padding: 20px; text-align: center; margin: 20px 0;">
        <h1 style="color: #007bff; font-size: 32px; margin: 0; letter-spacing: 5px;">{code}</h1>
    </div>
    <p>This code will expire in 10 minutes.</p>
    <p>If you didn't request this code, please ignore this email.</p>
</div>"#
    );
    OutboundEmail {
        to: to.to_string(),
        subject: "Nexus - Email Verification Code".to_string(),
        html_body,
    }
}

#[must_use]
pub fn password_reset_email(to: &str, code: &str) -> OutboundEmail {
    let html_body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <h2 style="color: #333;">Password Reset Request</h2>
    <p>You requested to reset the password for your Nexus account.</p>
    <p>Your password reset code is:</p>
    <div style="background-color: #f4f4f4; padding: 20px; text-align: center; margin: 20px 0;">
        <h1 style="color: #dc3545; font-size: 32px; margin: 0; letter-spacing: 5px;">{code}</h1>
    </div>
    <p>This code will expire in 15 minutes.</p>
    <p><strong>If you didn't request a password reset, please ignore this email.
    Your password will remain unchanged.</strong></p>
</div>"#
    );
    OutboundEmail {
        to: to.to_string(),
        subject: "Nexus - Password Reset Code".to_string(),
        html_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_carries_the_code() {
        let email = verification_code_email("alice@iitb.ac.in", "123456");
        assert_eq!(email.to, "alice@iitb.ac.in");
        assert!(email.subject.contains("Verification"));
        assert!(email.html_body.contains("123456"));
        assert!(email.html_body.contains("10 minutes"));
    }

    #[test]
    fn reset_email_carries_the_code() {
        let email = password_reset_email("alice@iitb.ac.in", "654321");
        assert!(email.subject.contains("Password Reset"));
        assert!(email.html_body.contains("654321"));
        assert!(email.html_body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        let email = verification_code_email("alice@iitb.ac.in", "123456");
        assert!(mailer.send(&email).await.is_ok());
    }

    #[tokio::test]
    async fn smtp_mailer_builds_with_credentials() {
        let config = SmtpConfig {
            host: "smtp.gmail.com".to_string(),
            username: Some("mailer@gmail.com".to_string()),
            password: Some(SecretString::from("app-password".to_string())),
            from: "Nexus <mailer@gmail.com>".to_string(),
        };
        assert!(SmtpMailer::new(&config).is_ok());
    }
}

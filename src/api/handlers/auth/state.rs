//! Auth state and configuration.

use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::api::email::Mailer;

use super::utils::normalize_email;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_REGISTRATION_CODE_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_RESET_CODE_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_CODE_SWEEP_INTERVAL_SECONDS: u64 = 5 * 60;
const DEFAULT_OAUTH_STATE_TTL_SECONDS: u64 = 10 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    jwt_secret: SecretString,
    /// Privileged addresses, normalized; membership grants `super_admin`.
    admin_emails: HashSet<String>,
    bcrypt_cost: u32,
    token_ttl_seconds: i64,
    registration_code_ttl_seconds: i64,
    reset_code_ttl_seconds: i64,
    code_sweep_interval_seconds: u64,
    oauth_state_ttl_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, jwt_secret: SecretString) -> Self {
        Self {
            frontend_base_url,
            jwt_secret,
            admin_emails: HashSet::new(),
            bcrypt_cost: 10,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            registration_code_ttl_seconds: DEFAULT_REGISTRATION_CODE_TTL_SECONDS,
            reset_code_ttl_seconds: DEFAULT_RESET_CODE_TTL_SECONDS,
            code_sweep_interval_seconds: DEFAULT_CODE_SWEEP_INTERVAL_SECONDS,
            oauth_state_ttl_seconds: DEFAULT_OAUTH_STATE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_admin_emails<I>(mut self, emails: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.admin_emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .filter(|email| !email.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_registration_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.registration_code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.code_sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_oauth_state_ttl_seconds(mut self, seconds: u64) -> Self {
        self.oauth_state_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    /// Allow-list membership check on an already-normalized email.
    #[must_use]
    pub fn is_admin_email(&self, email_normalized: &str) -> bool {
        self.admin_emails.contains(email_normalized)
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(crate) fn registration_code_ttl_seconds(&self) -> i64 {
        self.registration_code_ttl_seconds
    }

    pub(crate) fn reset_code_ttl_seconds(&self) -> i64 {
        self.reset_code_ttl_seconds
    }

    pub(crate) fn code_sweep_interval_seconds(&self) -> u64 {
        self.code_sweep_interval_seconds
    }

    pub(crate) fn oauth_state_ttl_seconds(&self) -> u64 {
        self.oauth_state_ttl_seconds
    }
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
}

/// In-flight OAuth login awaiting the provider callback.
pub(super) struct PendingLogin {
    pub(super) pkce_verifier: String,
    created_at: Instant,
}

/// Google sign-in state: optional provider config plus the CSRF/PKCE state
/// for logins that have been redirected but not yet called back.
pub struct OAuthState {
    google: Option<GoogleConfig>,
    state_ttl: Duration,
    pending: Mutex<HashMap<String, PendingLogin>>,
}

impl OAuthState {
    #[must_use]
    pub fn new(google: Option<GoogleConfig>, state_ttl: Duration) -> Self {
        Self {
            google,
            state_ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn google(&self) -> Option<&GoogleConfig> {
        self.google.as_ref()
    }

    pub(super) async fn store_pending(&self, csrf_state: String, pkce_verifier: String) {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, login| login.created_at.elapsed() < self.state_ttl);
        pending.insert(
            csrf_state,
            PendingLogin {
                pkce_verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Take the PKCE verifier for a callback, if the state is known and fresh.
    pub(super) async fn take_pending(&self, csrf_state: &str) -> Option<String> {
        let mut pending = self.pending.lock().await;
        let login = pending.remove(csrf_state)?;
        if login.created_at.elapsed() < self.state_ttl {
            Some(login.pkce_verifier)
        } else {
            None
        }
    }
}

pub struct AuthState {
    config: AuthConfig,
    oauth: OAuthState,
    mailer: Arc<dyn Mailer>,
}

impl AuthState {
    pub fn new(config: AuthConfig, oauth: OAuthState, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config,
            oauth,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthState {
        &self.oauth
    }

    pub(crate) fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogMailer;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "https://nexus.campus".to_string(),
            SecretString::from("test-secret".to_string()),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config();

        assert_eq!(config.frontend_base_url(), "https://nexus.campus");
        assert_eq!(config.bcrypt_cost(), 10);
        assert_eq!(config.token_ttl_seconds(), super::DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(
            config.registration_code_ttl_seconds(),
            super::DEFAULT_REGISTRATION_CODE_TTL_SECONDS
        );
        assert_eq!(
            config.reset_code_ttl_seconds(),
            super::DEFAULT_RESET_CODE_TTL_SECONDS
        );

        let config = config
            .with_bcrypt_cost(4)
            .with_token_ttl_seconds(60)
            .with_registration_code_ttl_seconds(30)
            .with_reset_code_ttl_seconds(45)
            .with_code_sweep_interval_seconds(7)
            .with_oauth_state_ttl_seconds(9);

        assert_eq!(config.bcrypt_cost(), 4);
        assert_eq!(config.token_ttl_seconds(), 60);
        assert_eq!(config.registration_code_ttl_seconds(), 30);
        assert_eq!(config.reset_code_ttl_seconds(), 45);
        assert_eq!(config.code_sweep_interval_seconds(), 7);
        assert_eq!(config.oauth_state_ttl_seconds(), 9);
    }

    #[test]
    fn admin_allow_list_is_normalized() {
        let config = config().with_admin_emails(vec![" Root@Gmail.COM ", "", "ops@gmail.com"]);

        assert!(config.is_admin_email("root@gmail.com"));
        assert!(config.is_admin_email("ops@gmail.com"));
        assert!(!config.is_admin_email("student@iitb.ac.in"));
    }

    #[tokio::test]
    async fn pending_login_round_trips() {
        let oauth = OAuthState::new(None, Duration::from_secs(60));
        oauth
            .store_pending("csrf".to_string(), "verifier".to_string())
            .await;

        assert_eq!(
            oauth.take_pending("csrf").await,
            Some("verifier".to_string())
        );
        // Single use: the state is gone after the first take.
        assert_eq!(oauth.take_pending("csrf").await, None);
    }

    #[tokio::test]
    async fn pending_login_expires() {
        let oauth = OAuthState::new(None, Duration::from_millis(10));
        oauth
            .store_pending("csrf".to_string(), "verifier".to_string())
            .await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(oauth.take_pending("csrf").await, None);
    }

    #[test]
    fn auth_state_exposes_config() {
        let state = AuthState::new(
            config(),
            OAuthState::new(None, Duration::from_secs(60)),
            Arc::new(LogMailer),
        );
        assert_eq!(state.config().frontend_base_url(), "https://nexus.campus");
        assert!(state.oauth().google().is_none());
    }
}

//! Service configuration read from environment variables.

use std::{env, sync::Arc};

use crate::email::{HttpMailer, LogMailer, Mailer};

/// The environment variable holding the secret used to sign and encrypt cookies.
pub const SECRET_VAR: &str = "SECRET";
/// The environment variable holding the bearer token for the cron endpoints.
pub const CRON_SECRET_VAR: &str = "CRON_SECRET";
/// The environment variable holding the shared secret for the user-sync webhook.
pub const WEBHOOK_SECRET_VAR: &str = "WEBHOOK_SECRET";
/// The environment variable holding the email provider's send endpoint.
pub const EMAIL_API_URL_VAR: &str = "EMAIL_API_URL";
/// The environment variable holding the email provider's API key.
pub const EMAIL_API_KEY_VAR: &str = "EMAIL_API_KEY";
/// The environment variable holding the sender address for outgoing email.
pub const EMAIL_FROM_VAR: &str = "EMAIL_FROM";

const DEFAULT_EMAIL_FROM: &str = "Household Ledger <no-reply@localhost>";

/// Errors from reading the service configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is not set or is empty.
    #[error("the environment variable '{0}' must be set")]
    Missing(&'static str),
}

/// Email provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailConfig {
    /// The provider's send endpoint.
    pub api_url: String,
    /// The provider's API key.
    pub api_key: String,
    /// The sender address.
    pub from: String,
}

/// Secrets and provider settings for the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// The secret used to derive the cookie key.
    pub cookie_secret: String,
    /// The bearer token that authorizes cron requests.
    pub cron_secret: String,
    /// The shared secret that authorizes webhook requests.
    pub webhook_secret: String,
    /// The email provider, or `None` to log emails instead of sending them.
    pub email: Option<EmailConfig>,
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [ConfigError::Missing] if a required variable is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration using `lookup` to get variable values.
    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let email = match (get(EMAIL_API_URL_VAR), get(EMAIL_API_KEY_VAR)) {
            (Some(api_url), Some(api_key)) => Some(EmailConfig {
                api_url,
                api_key,
                from: get(EMAIL_FROM_VAR).unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_owned()),
            }),
            _ => None,
        };

        Ok(Self {
            cookie_secret: require(SECRET_VAR)?,
            cron_secret: require(CRON_SECRET_VAR)?,
            webhook_secret: require(WEBHOOK_SECRET_VAR)?,
            email,
        })
    }

    /// Build the mailer for the configured email provider.
    ///
    /// Falls back to a [LogMailer] when no provider is configured.
    pub fn mailer(&self) -> Arc<dyn Mailer> {
        match &self.email {
            Some(email) => Arc::new(HttpMailer::new(&email.api_url, &email.api_key, &email.from)),
            None => {
                tracing::warn!(
                    "{EMAIL_API_URL_VAR} or {EMAIL_API_KEY_VAR} is not set, emails will be logged instead of sent"
                );
                Arc::new(LogMailer)
            }
        }
    }
}

//! Sending email through a transactional email provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::Error;

/// A rendered email ready to be sent to a single recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    /// The recipient's email address.
    pub to: String,
    /// The subject line.
    pub subject: String,
    /// The HTML body.
    pub html: String,
    /// The plain text body for clients that do not render HTML.
    pub text: String,
}

/// Something that can deliver an [EmailMessage].
#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Send `message`.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmailError] if the message could not be delivered.
    async fn send(&self, message: &EmailMessage) -> Result<(), Error>;
}

/// Sends email by posting JSON to an email provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl HttpMailer {
    /// Create a mailer that posts to `api_url` authenticated with the bearer token `api_key`,
    /// sending messages from the address `from`.
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_owned(),
            api_key: api_key.to_owned(),
            from: from.to_owned(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), Error> {
        let request = SendEmailRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| Error::EmailError(error.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Email provider responded with {status}: {body}");
            return Err(Error::EmailError(format!(
                "email provider responded with {status}"
            )));
        }

        tracing::debug!("Sent email \"{}\"", message.subject);

        Ok(())
    }
}

/// Writes emails to the log instead of sending them.
///
/// Used when no email provider is configured, e.g. during development.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), Error> {
        tracing::info!(
            "Email to {} with subject \"{}\":\n{}",
            message.to,
            message.subject,
            message.text
        );

        Ok(())
    }
}

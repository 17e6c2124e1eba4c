use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::info;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Message handed to a [`Mailer`]. The sender address belongs to the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Outbound email transport. Called from blocking workflow steps.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Writes messages to the log instead of delivering them. Used when no mail API key
/// is configured.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        info!(
            from = %self.from,
            to = ?email.to,
            subject = %email.subject,
            bytes = email.html.len(),
            "mail delivery disabled; message logged only"
        );
        Ok(())
    }
}

/// Resend HTTP API client.
pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl ResendMailer {
    /// Builds the blocking HTTP client. Must not be called from inside an async task.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| MailError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
            endpoint: RESEND_ENDPOINT.to_string(),
        })
    }
}

impl Mailer for ResendMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let body = ResendRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| MailError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(to = ?email.to, subject = %email.subject, "email accepted by provider");
        Ok(())
    }
}

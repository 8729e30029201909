//! Outbound email abstraction.
//!
//! Workflows hand a recipient, template name, and JSON payload to a
//! [`Mailer`] and move on; delivery happens on a detached task that
//! outlives the HTTP response. The default [`LogMailer`] logs the payload
//! instead of speaking SMTP, which is also what local development uses.

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use tracing::info;

/// SMTP connection parameters, supplied through the environment/config
/// surface and carried even when the active sender only logs.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub sender: String,
}

/// Email delivery abstraction.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a templated message or return an error. Errors are logged
    /// by the dispatching task and never surface to the request.
    async fn send(&self, to: &str, template: &str, payload: &Value) -> Result<()>;
}

/// Sender that logs the message instead of delivering it.
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    #[must_use]
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            sender: config.sender.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, template: &str, payload: &Value) -> Result<()> {
        info!(
            from = %self.sender,
            to_email = %to,
            template = %template,
            payload = %payload,
            "email send stub"
        );
        Ok(())
    }
}

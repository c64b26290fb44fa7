//! Outbound replies via SMTP (lettre).
//!
//! One authenticated connection per message, no pooling. Port 465 uses
//! implicit TLS, anything else STARTTLS.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::channels::email::EmailConfig;
use crate::channels::email_types::OutboundMessage;
use crate::channels::traits::ReplySender;
use crate::error::DeliveryError;

/// SMTP command timeout.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Port on which the server expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends replies from the configured mailbox address.
pub struct SmtpSender {
    config: EmailConfig,
}

impl SmtpSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Build the MIME message: multipart/mixed with one text/plain part.
    pub fn compose(&self, reply: &OutboundMessage) -> Result<Message, DeliveryError> {
        let from = parse_mailbox(&self.config.address)?;
        let to = parse_mailbox(&reply.to)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(reply.subject.clone())
            .multipart(MultiPart::mixed().singlepart(SinglePart::plain(reply.body.clone())))
            .map_err(|e| DeliveryError::Compose(e.to_string()))
    }

    fn transport(&self) -> Result<SmtpTransport, DeliveryError> {
        let host = self.config.smtp_host.as_str();
        let builder = if self.config.smtp_port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(host)
        } else {
            SmtpTransport::starttls_relay(host)
        }
        .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?;

        let creds = Credentials::new(
            self.config.address.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

#[async_trait]
impl ReplySender for SmtpSender {
    async fn send(&self, reply: &OutboundMessage) -> Result<(), DeliveryError> {
        let email = self.compose(reply)?;
        let transport = self.transport()?;

        // lettre sends QUIT after a successful transaction and drops the
        // connection on error.
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))?
            .map_err(|e| DeliveryError::Transport(format!("SMTP send failed: {e}")))?;

        tracing::info!(to = %reply.to, subject = %reply.subject, "Reply sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

// ── Tests ───────────────────────────────────────────────────────────

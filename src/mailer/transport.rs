//! Mail transport abstraction and the SMTP implementation
//!
//! The dispatcher only sees `MailTransport`; tests swap in an in-process
//! transport while production uses `AsyncSmtpTransport<Tokio1Executor>`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use thiserror::Error;

use super::envelope::OutgoingMail;
use crate::config::{SmtpConfig, TlsMode};

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transient delivery failure: {0}")]
    Transient(String),

    #[error("Permanent delivery failure: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Connection problems, timeouts and 4xx replies
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}

/// What the transport reports for an accepted mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Addresses the mail was handed over for
    pub recipients: Vec<String>,
    /// First line of the server reply
    pub response: String,
}

/// Async mail transport
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<DeliveryReceipt, TransportError>;
}

/// SMTP transport backed by lettre
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    default_from: Mailbox,
}

impl SmtpTransport {
    /// Build a transport from configuration.
    ///
    /// No connection is opened until the first delivery, but the
    /// connection pool is started here, so this must run inside a Tokio
    /// runtime.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, TransportError> {
        let default_from = parse_mailbox(&config.from)?;

        let builder = match config.tls {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            TlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| TransportError::Build(e.to_string()))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| TransportError::Build(e.to_string()))?,
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            "SMTP transport configured"
        );

        Ok(Self {
            inner: builder.build(),
            default_from,
        })
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, TransportError> {
        let envelope = &mail.envelope;
        if envelope.to.is_empty() {
            return Err(TransportError::InvalidAddress(
                "at least one recipient is required".to_string(),
            ));
        }

        let from = match &envelope.from {
            Some(address) => parse_mailbox(address)?,
            None => self.default_from.clone(),
        };

        let mut builder = Message::builder().from(from).subject(mail.subject.clone());
        for address in &envelope.to {
            builder = builder.to(parse_mailbox(address)?);
        }
        for address in &envelope.cc {
            builder = builder.cc(parse_mailbox(address)?);
        }
        for address in &envelope.bcc {
            builder = builder.bcc(parse_mailbox(address)?);
        }
        if let Some(address) = &envelope.reply_to {
            builder = builder.reply_to(parse_mailbox(address)?);
        }

        let message = match &mail.text {
            Some(text) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                mail.html.clone(),
            )),
            None => builder.header(ContentType::TEXT_HTML).body(mail.html.clone()),
        };

        message.map_err(|e| TransportError::Build(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<DeliveryReceipt, TransportError> {
        let message = self.build_message(mail)?;

        let response = self.inner.send(message).await.map_err(|e| {
            if e.is_permanent() {
                TransportError::Permanent(e.to_string())
            } else {
                TransportError::Transient(e.to_string())
            }
        })?;

        Ok(DeliveryReceipt {
            recipients: mail.envelope.recipients(),
            response: response.first_line().unwrap_or_default().to_string(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", address, e)))
}

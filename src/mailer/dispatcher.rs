use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::backoff::{BackoffConfig, ExponentialBackoff};
use super::envelope::{Envelope, OutgoingMail};
use super::transport::{DeliveryReceipt, MailTransport, TransportError};
use crate::config::RetryConfig;
use crate::error::{MailError, Result};
use crate::metrics::MailMetrics;
use crate::template::{RenderOptions, TemplateEngine, Variables};

/// Language, variables and envelope for one templated mail
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Requested language; empty means the engine default
    pub lang: String,
    pub variables: Variables,
    pub envelope: Envelope,
    /// Optional plain-text alternative sent next to the HTML body
    pub text: Option<String>,
}

impl SendOptions {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            ..Self::default()
        }
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions::new(self.lang.clone()).vars(self.variables.clone())
    }
}

/// One recipient of a bulk send with its own variables
#[derive(Debug, Clone)]
pub struct BulkRecipient {
    pub email: String,
    /// Merged over the shared bulk variables
    pub variables: Variables,
}

impl BulkRecipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            variables: Variables::new(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Shared settings for a bulk send
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    pub lang: String,
    /// Variables common to every recipient
    pub variables: Variables,
    /// Sender, copies and reply-to applied to every mail; `to` is ignored
    pub envelope: Envelope,
    /// Attempts per recipient; `None` uses the configured maximum
    pub max_attempts: Option<u32>,
    /// Pause between recipients; `None` uses the configured delay
    pub delay: Option<Duration>,
}

/// Result of a delivery with retries
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub recipients: Vec<String>,
    pub success: bool,
    /// Attempts made, including the first
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<DeliveryReceipt>,
    /// Last transport error when delivery failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a bulk send
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

/// Statistics for the mailer
#[derive(Debug, Default)]
pub struct MailerStats {
    /// Mails accepted by the transport
    pub total_sent: AtomicU64,
    /// Mails that exhausted their attempts or failed permanently
    pub total_failed: AtomicU64,
    /// Retries after transient failures
    pub total_retries: AtomicU64,
    /// Sends rejected while compiling the template
    pub template_errors: AtomicU64,
}

impl MailerStats {
    pub fn snapshot(&self) -> MailerStatsSnapshot {
        MailerStatsSnapshot {
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            template_errors: self.template_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of mailer statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MailerStatsSnapshot {
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_retries: u64,
    pub template_errors: u64,
}

/// Compiles templates and hands the result to a transport
pub struct Mailer {
    engine: Arc<TemplateEngine>,
    transport: Arc<dyn MailTransport>,
    retry: RetryConfig,
    stats: MailerStats,
}

impl Mailer {
    pub fn new(
        engine: Arc<TemplateEngine>,
        transport: Arc<dyn MailTransport>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            engine,
            transport,
            retry,
            stats: MailerStats::default(),
        }
    }

    pub fn engine(&self) -> &Arc<TemplateEngine> {
        &self.engine
    }

    /// Get mailer statistics
    pub fn stats(&self) -> MailerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Compile and send one mail without retrying
    #[tracing::instrument(name = "mailer.send", skip_all, fields(template = %template))]
    pub async fn send(&self, template: &str, options: &SendOptions) -> Result<DeliveryReceipt> {
        let mail = self.compose(template, options)?;

        match self.transport.deliver(&mail).await {
            Ok(receipt) => {
                self.record_sent();
                tracing::info!(recipients = ?receipt.recipients, "Mail sent");
                Ok(receipt)
            }
            Err(e) => {
                self.record_failed();
                tracing::warn!(error = %e, "Mail delivery failed");
                Err(e.into())
            }
        }
    }

    /// Compile and send one mail, retrying transient transport failures.
    ///
    /// Template errors are returned as `Err` without any delivery attempt.
    /// Transport failures end up in the returned outcome.
    #[tracing::instrument(
        name = "mailer.send_with_retry",
        skip_all,
        fields(template = %template, max_attempts = max_attempts)
    )]
    pub async fn send_with_retry(
        &self,
        template: &str,
        options: &SendOptions,
        max_attempts: u32,
    ) -> Result<DeliveryOutcome> {
        let mail = self.compose(template, options)?;
        Ok(self.deliver_with_retry(&mail, max_attempts).await)
    }

    /// Send a template to many recipients, one mail each.
    ///
    /// Every mail is compiled before the first delivery, so a template
    /// error aborts the batch without sending anything. Delivery failures
    /// are reported per recipient.
    #[tracing::instrument(
        name = "mailer.send_bulk",
        skip_all,
        fields(template = %template, total = recipients.len())
    )]
    pub async fn send_bulk(
        &self,
        template: &str,
        recipients: &[BulkRecipient],
        options: &BulkOptions,
    ) -> Result<BulkReport> {
        let mails = recipients
            .iter()
            .map(|recipient| {
                let mut variables = options.variables.clone();
                variables.extend(recipient.variables.clone());

                let send_options = SendOptions {
                    lang: options.lang.clone(),
                    variables,
                    envelope: options.envelope.with_recipient(recipient.email.clone()),
                    text: None,
                };
                self.compose(template, &send_options)
            })
            .collect::<Result<Vec<_>>>()?;

        let max_attempts = options.max_attempts.unwrap_or(self.retry.max_attempts);
        let delay = options
            .delay
            .unwrap_or_else(|| Duration::from_millis(self.retry.bulk_delay_ms));

        let mut outcomes = Vec::with_capacity(mails.len());
        for (index, mail) in mails.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcomes.push(self.deliver_with_retry(mail, max_attempts).await);
        }

        let sent = outcomes.iter().filter(|o| o.success).count();
        let report = BulkReport {
            total: outcomes.len(),
            sent,
            failed: outcomes.len() - sent,
            outcomes,
        };

        tracing::info!(sent = report.sent, failed = report.failed, "Bulk send finished");
        Ok(report)
    }

    fn compose(&self, template: &str, options: &SendOptions) -> Result<OutgoingMail> {
        let compiled = self
            .engine
            .compile_mail(template, &options.render_options())
            .map_err(|e| {
                self.stats.template_errors.fetch_add(1, Ordering::Relaxed);
                MailMetrics::record_template_failure();
                tracing::error!(template = %template, error = %e, "Failed to compile mail");
                MailError::from(e)
            })?;

        Ok(OutgoingMail {
            envelope: options.envelope.clone(),
            subject: compiled.subject,
            html: compiled.html,
            text: options.text.clone(),
        })
    }

    async fn deliver_with_retry(&self, mail: &OutgoingMail, max_attempts: u32) -> DeliveryOutcome {
        let max_attempts = max_attempts.max(1);
        let mut backoff = ExponentialBackoff::with_config(BackoffConfig::from(&self.retry));
        let mut attempts = 0;
        let mut last_error: Option<TransportError> = None;

        while attempts < max_attempts {
            if attempts > 0 {
                let delay = backoff.next_delay();
                self.stats.total_retries.fetch_add(1, Ordering::Relaxed);
                MailMetrics::record_retry();
                tracing::debug!(
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying delivery"
                );
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            match self.transport.deliver(mail).await {
                Ok(receipt) => {
                    self.record_sent();
                    tracing::info!(recipients = ?receipt.recipients, attempts, "Mail sent");
                    return DeliveryOutcome {
                        recipients: mail.envelope.recipients(),
                        success: true,
                        attempts,
                        receipt: Some(receipt),
                        error: None,
                    };
                }
                Err(e) => {
                    tracing::warn!(attempt = attempts, error = %e, "Delivery attempt failed");
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        self.record_failed();
        DeliveryOutcome {
            recipients: mail.envelope.recipients(),
            success: false,
            attempts,
            receipt: None,
            error: last_error.map(|e| e.to_string()),
        }
    }

    fn record_sent(&self) {
        self.stats.total_sent.fetch_add(1, Ordering::Relaxed);
        MailMetrics::record_sent();
    }

    fn record_failed(&self) {
        self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        MailMetrics::record_transport_failure();
    }
}

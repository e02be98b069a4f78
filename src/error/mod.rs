use thiserror::Error;

use crate::mailer::TransportError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl MailError {
    /// Stable code for logs and reports
    pub fn code(&self) -> &'static str {
        match self {
            MailError::Config(_) => "CONFIG_ERROR",
            MailError::Template(TemplateError::InvalidTemplateName(_)) => "INVALID_TEMPLATE_NAME",
            MailError::Template(TemplateError::TemplateNotFound { .. }) => "TEMPLATE_NOT_FOUND",
            MailError::Template(TemplateError::MissingVariable { .. }) => "MISSING_VARIABLE",
            MailError::Template(_) => "TEMPLATE_ERROR",
            MailError::Transport(e) if e.is_retryable() => "TRANSPORT_TRANSIENT",
            MailError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Template content is static per process, so only transient
    /// transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MailError>;

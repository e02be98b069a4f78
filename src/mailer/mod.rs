//! Mail dispatch on top of the template engine.
//!
//! - `Envelope` / `OutgoingMail`: recipients and the compiled message
//! - `MailTransport`: async delivery seam, `SmtpTransport` for real SMTP
//! - `ExponentialBackoff`: delays between delivery attempts
//! - `Mailer`: single, retried and bulk sends

mod backoff;
mod dispatcher;
mod envelope;
mod transport;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use dispatcher::{
    BulkOptions, BulkRecipient, BulkReport, DeliveryOutcome, Mailer, MailerStats,
    MailerStatsSnapshot, SendOptions,
};
pub use envelope::{Envelope, OutgoingMail};
pub use transport::{DeliveryReceipt, MailTransport, SmtpTransport, TransportError};

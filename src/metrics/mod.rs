//! Prometheus metrics for template rendering and mail dispatch.
//!
//! This module provides:
//! - Template metrics (loads by origin, lookups that missed, missing variables)
//! - Render latency
//! - Mail metrics (sent, failed, retried)

mod helpers;

pub use helpers::{encode_metrics, MailMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara_mailer";

lazy_static! {
    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Template bodies served, by origin
    pub static ref TEMPLATE_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_loads_total", METRIC_PREFIX),
        "Total template bodies served by origin",
        &["origin"]
    ).unwrap();

    /// Lookups that exhausted every language candidate
    pub static ref TEMPLATE_NOT_FOUND_TOTAL: IntCounter = register_int_counter!(
        format!("{}_template_not_found_total", METRIC_PREFIX),
        "Total template lookups with no match"
    ).unwrap();

    /// Placeholders rendered without a value
    pub static ref TEMPLATE_MISSING_VARIABLES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_template_missing_variables_total", METRIC_PREFIX),
        "Total placeholders rendered without a value"
    ).unwrap();

    /// Template render duration
    pub static ref TEMPLATE_RENDER_DURATION: Histogram = register_histogram!(
        format!("{}_template_render_duration_seconds", METRIC_PREFIX),
        "Template render duration in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]
    ).unwrap();

    // ============================================================================
    // Mail Metrics
    // ============================================================================

    /// Mails accepted by the transport
    pub static ref MAILS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_mails_sent_total", METRIC_PREFIX),
        "Total mails accepted by the transport"
    ).unwrap();

    /// Mails that could not be delivered, by reason
    pub static ref MAILS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_mails_failed_total", METRIC_PREFIX),
        "Total mails that could not be delivered",
        &["reason"]
    ).unwrap();

    /// Delivery retries after a transient transport failure
    pub static ref MAIL_RETRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_mail_retries_total", METRIC_PREFIX),
        "Total delivery retries"
    ).unwrap();
}

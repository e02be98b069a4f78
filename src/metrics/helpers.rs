//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    MAILS_FAILED_TOTAL, MAILS_SENT_TOTAL, MAIL_RETRIES_TOTAL, TEMPLATE_LOADS_TOTAL,
    TEMPLATE_MISSING_VARIABLES_TOTAL, TEMPLATE_NOT_FOUND_TOTAL, TEMPLATE_RENDER_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    /// Record a body served from an in-memory registration
    pub fn record_memory_hit() {
        TEMPLATE_LOADS_TOTAL.with_label_values(&["memory"]).inc();
    }

    /// Record a body served from the cache
    pub fn record_cache_hit() {
        TEMPLATE_LOADS_TOTAL.with_label_values(&["cache"]).inc();
    }

    /// Record a body read from disk
    pub fn record_disk_read() {
        TEMPLATE_LOADS_TOTAL.with_label_values(&["disk"]).inc();
    }

    /// Record a lookup that found nothing
    pub fn record_not_found() {
        TEMPLATE_NOT_FOUND_TOTAL.inc();
    }

    /// Record placeholders rendered without a value
    pub fn record_missing(count: usize) {
        TEMPLATE_MISSING_VARIABLES_TOTAL.inc_by(count as u64);
    }

    /// Record how long a render took
    pub fn record_render(elapsed: Duration) {
        TEMPLATE_RENDER_DURATION.observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for recording mail metrics
pub struct MailMetrics;

impl MailMetrics {
    /// Record a mail accepted by the transport
    pub fn record_sent() {
        MAILS_SENT_TOTAL.inc();
    }

    /// Record a mail that failed while compiling its template
    pub fn record_template_failure() {
        MAILS_FAILED_TOTAL.with_label_values(&["template"]).inc();
    }

    /// Record a mail the transport refused or could not reach
    pub fn record_transport_failure() {
        MAILS_FAILED_TOTAL.with_label_values(&["transport"]).inc();
    }

    /// Record a retry after a transient failure
    pub fn record_retry() {
        MAIL_RETRIES_TOTAL.inc();
    }
}

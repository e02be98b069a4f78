//! Exponential backoff between delivery attempts

use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30_000, // 30 seconds
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for BackoffConfig {
    fn from(retry: &RetryConfig) -> Self {
        Self {
            initial_delay_ms: retry.initial_delay_ms,
            max_delay_ms: retry.max_delay_ms,
            multiplier: retry.multiplier,
        }
    }
}

/// Deterministic exponential backoff: `initial * multiplier^n`, capped
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_delay_ms: u64,
    attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with default configuration
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Create a new exponential backoff with custom configuration
    pub fn with_config(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms.min(config.max_delay_ms);
        Self {
            config,
            current_delay_ms: initial,
            attempt: 0,
        }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let delay = self.current_delay_ms;
        let grown = self.current_delay_ms as f64 * self.config.multiplier.max(1.0);
        self.current_delay_ms = grown.min(self.config.max_delay_ms as f64) as u64;

        Duration::from_millis(delay)
    }

    /// Reset the backoff to initial state
    pub fn reset(&mut self) {
        self.current_delay_ms = self.config.initial_delay_ms.min(self.config.max_delay_ms);
        self.attempt = 0;
    }

    /// Get the current attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

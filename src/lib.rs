// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Template engine
pub mod template;

// Mail dispatch
pub mod mailer;

mod settings;

pub use settings::{
    LogFormat, LoggingConfig, RetryConfig, Settings, SmtpConfig, TemplatesConfig, TlsMode,
};

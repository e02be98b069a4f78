use config::{Config, ConfigError, Environment, File, Map, Source};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Template engine options
#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// Language tried after the requested one misses
    #[serde(default = "default_lang")]
    pub default_lang: String,
    /// Root directory holding `<lang-dir>/<name>.xhtml`
    #[serde(default = "default_templates_path")]
    pub templates_path: PathBuf,
    /// Placeholder values merged over the built-in defaults
    #[serde(default)]
    pub defaults: HashMap<String, String>,
    /// Fail renders with missing variables instead of warning
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    None,
    Starttls,
    Tls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_tls_mode")]
    pub tls: TlsMode,
    /// Sender used when a mail does not set one
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Delivery attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Pause between recipients of a bulk send
    #[serde(default)]
    pub bulk_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_templates_path() -> PathBuf {
    PathBuf::from("templates")
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_tls_mode() -> TlsMode {
    TlsMode::Starttls
}

fn default_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000 // 30 seconds
}

/// Environment prefix and separator, e.g. `MAILER__SMTP__HOST`
const ENV_PREFIX: &str = "MAILER";
const ENV_SEPARATOR: &str = "__";

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::from_sources(
            vec![
                File::with_name("config/default").required(false),
                File::with_name(&format!("config/{}", run_mode)).required(false),
            ],
            env::vars().collect(),
        )
    }

    /// Layer `files` in order, then `MAILER__*` entries of `vars`
    pub fn from_sources<S>(files: Vec<S>, vars: Map<String, String>) -> Result<Self, ConfigError>
    where
        S: Source + Clone + Send + Sync + 'static,
    {
        let mut builder = Config::builder()
            // Start with default values
            .set_default("templates.default_lang", "en")?
            .set_default("templates.templates_path", "templates")?
            .set_default("smtp.host", "localhost")?
            .set_default("smtp.port", 587)?
            .set_default("retry.max_attempts", 3)?;

        // Load config files if they exist
        for file in &files {
            builder = builder.add_source(file.clone());
        }

        // Load from environment variables
        // MAILER__SMTP__HOST, MAILER__TEMPLATES__DEFAULT_LANG, etc.
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.templates.defaults = template_defaults(&files, &vars)?;
        Ok(settings)
    }
}

/// Re-read `templates.defaults` with placeholder case intact.
///
/// `config` lowercases keys while merging sources, so `APP_NAME` would
/// arrive as `app_name`. Each file is collected on its own instead, later
/// files and then environment variables overriding earlier entries.
fn template_defaults<S: Source>(
    files: &[S],
    vars: &Map<String, String>,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut defaults = HashMap::new();

    for file in files {
        let Some(templates) = file.collect()?.remove("templates") else {
            continue;
        };
        let Some(section) = templates.into_table()?.remove("defaults") else {
            continue;
        };
        for (key, value) in section.into_table()? {
            defaults.insert(key, value.into_string()?);
        }
    }

    let env_prefix = format!(
        "{prefix}{sep}TEMPLATES{sep}DEFAULTS{sep}",
        prefix = ENV_PREFIX,
        sep = ENV_SEPARATOR
    );
    for (key, value) in vars {
        let matches_prefix = key
            .get(..env_prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&env_prefix));
        if matches_prefix && key.len() > env_prefix.len() {
            defaults.insert(key[env_prefix.len()..].to_string(), value.clone());
        }
    }

    Ok(defaults)
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            default_lang: default_lang(),
            templates_path: default_templates_path(),
            defaults: HashMap::new(),
            strict: false,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            tls: default_tls_mode(),
            from: default_from(),
            timeout_seconds: default_smtp_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            bulk_delay_ms: 0,
        }
    }
}

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use ara_mailer::config::Settings;
use ara_mailer::mailer::{Envelope, Mailer, SendOptions, SmtpTransport};
use ara_mailer::telemetry::init_tracing;
use ara_mailer::template::{RenderOptions, TemplateEngine};

#[derive(Parser)]
#[command(name = "ara-mailer", version, about = "Render and send localized mail templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template to stdout
    Render {
        name: String,
        #[arg(long)]
        lang: Option<String>,
        /// Placeholder value, KEY=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// Show where a template resolves
    Info {
        name: String,
        #[arg(long)]
        lang: Option<String>,
    },
    /// List templates available for a language
    List {
        #[arg(long)]
        lang: Option<String>,
    },
    /// Render a template and deliver it over SMTP
    Send {
        name: String,
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(long)]
        cc: Vec<String>,
        #[arg(long)]
        bcc: Vec<String>,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// Delivery attempts; defaults to the configured maximum
        #[arg(long)]
        attempts: Option<u32>,
    },
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::new()?;
    init_tracing(&settings.logging)?;
    tracing::debug!("Configuration loaded");

    let engine = Arc::new(TemplateEngine::new(settings.templates.clone())?);
    let subjects = engine.load_subject_files()?;
    tracing::debug!(subjects, "Subject lines loaded");

    match cli.command {
        Command::Render { name, lang, vars } => {
            let mut options = RenderOptions::new(lang.unwrap_or_default());
            for (key, value) in vars {
                options = options.var(key, value);
            }
            println!("{}", engine.compile_template(&name, &options)?);
        }
        Command::Info { name, lang } => {
            let info = engine.template_info(&name, &lang.unwrap_or_default())?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::List { lang } => {
            for name in engine.list_available_templates(&lang.unwrap_or_default())? {
                println!("{}", name);
            }
        }
        Command::Send {
            name,
            to,
            cc,
            bcc,
            lang,
            vars,
            attempts,
        } => {
            let transport = Arc::new(SmtpTransport::from_config(&settings.smtp)?);
            let mailer = Mailer::new(engine, transport, settings.retry.clone());

            let envelope = Envelope {
                to,
                cc,
                bcc,
                ..Envelope::default()
            };
            let mut options = SendOptions::new(envelope).lang(lang.unwrap_or_default());
            for (key, value) in vars {
                options = options.var(key, value);
            }

            let attempts = attempts.unwrap_or(settings.retry.max_attempts);
            let outcome = mailer.send_with_retry(&name, &options, attempts).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if !outcome.success {
                bail!("delivery failed after {} attempt(s)", outcome.attempts);
            }
        }
    }

    Ok(())
}

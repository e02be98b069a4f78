//! Template engine: store, subjects and interpolation behind one facade

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use chrono::{Datelike, Utc};

use super::language::is_valid_language_tag;
use super::store::TemplateStore;
use super::subjects::SubjectRegistry;
use super::substitution::substitute_variables;
use super::types::{
    is_valid_identifier, CompiledMail, Rendered, TemplateError, TemplateInfo, TemplateResult,
    Variables,
};
use crate::config::TemplatesConfig;
use crate::metrics::TemplateMetrics;

/// Per-language subject map looked up by `load_subject_files`
pub const SUBJECTS_FILE: &str = "subjects.json";

/// Language and variables for one render call
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Requested language; empty means the engine default
    pub lang: String,
    pub variables: Variables,
}

impl RenderOptions {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            variables: Variables::new(),
        }
    }

    /// Set one variable
    pub fn var(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Merge a whole variable bag, replacing existing keys
    pub fn vars(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }
}

/// Values every template can reference without the caller supplying them
pub fn builtin_defaults() -> HashMap<String, String> {
    let mut defaults = HashMap::new();
    defaults.insert("APP_NAME".to_string(), "Ara".to_string());
    defaults.insert("APP_URL".to_string(), "http://localhost".to_string());
    defaults.insert("SUPPORT_EMAIL".to_string(), "support@localhost".to_string());
    defaults.insert("CURRENT_YEAR".to_string(), Utc::now().year().to_string());
    defaults
}

/// Renders named, localized templates.
///
/// Defaults are fixed at construction. The store and subject registry are
/// owned by this instance; separate engines never share a cache.
pub struct TemplateEngine {
    store: TemplateStore,
    subjects: SubjectRegistry,
    defaults: HashMap<String, String>,
    default_lang: String,
    strict: bool,
}

impl TemplateEngine {
    /// Build an engine, validating the configuration first
    pub fn new(config: TemplatesConfig) -> TemplateResult<Self> {
        validate_config(&config)?;

        let mut defaults = builtin_defaults();
        defaults.extend(config.defaults);

        tracing::debug!(
            templates_path = %config.templates_path.display(),
            default_lang = %config.default_lang,
            strict = config.strict,
            "Template engine initialized"
        );

        Ok(Self {
            store: TemplateStore::new(config.templates_path, config.default_lang.clone()),
            subjects: SubjectRegistry::new(config.default_lang.clone()),
            defaults,
            default_lang: config.default_lang,
            strict: config.strict,
        })
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn subjects(&self) -> &SubjectRegistry {
        &self.subjects
    }

    /// Effective defaults (built-ins merged with configured overrides)
    pub fn defaults(&self) -> &HashMap<String, String> {
        &self.defaults
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn register_template_string(
        &self,
        name: &str,
        body: impl Into<String>,
        lang: &str,
    ) -> TemplateResult<()> {
        self.store.register(name, body, lang)
    }

    pub fn register_subject(
        &self,
        name: &str,
        subject: impl Into<String>,
        lang: &str,
    ) -> TemplateResult<()> {
        self.subjects.register(name, subject, lang)
    }

    /// Load `subjects.json` style name → subject maps for a language
    pub fn load_subjects(&self, lang: &str, path: impl AsRef<Path>) -> TemplateResult<usize> {
        self.subjects.load_json(lang, path)
    }

    /// Load every `<templates_path>/<lang-dir>/subjects.json`.
    ///
    /// Returns the number of subjects registered across all languages.
    pub fn load_subject_files(&self) -> TemplateResult<usize> {
        let entries = match fs::read_dir(self.store.templates_path()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut total = 0;
        for entry in entries {
            let dir = entry?.path();
            let path = dir.join(SUBJECTS_FILE);
            if !path.is_file() {
                continue;
            }
            if let Some(lang) = dir.file_name().and_then(|n| n.to_str()) {
                total += self.subjects.load_json(lang, &path)?;
            }
        }
        Ok(total)
    }

    pub fn load(&self, name: &str, lang: &str) -> TemplateResult<String> {
        self.store.load(name, lang)
    }

    pub fn clear_cache(&self) {
        self.store.clear_cache();
    }

    pub fn clear_template_cache(&self, name: &str, lang: &str) {
        self.store.clear_template_cache(name, lang);
    }

    pub fn template_exists(&self, name: &str, lang: &str) -> bool {
        self.store.exists(name, lang)
    }

    pub fn template_info(&self, name: &str, lang: &str) -> TemplateResult<TemplateInfo> {
        self.store.info(name, lang)
    }

    pub fn list_available_templates(&self, lang: &str) -> TemplateResult<Vec<String>> {
        self.store.list(lang)
    }

    /// Substitute `variables` over the engine defaults into `template`.
    ///
    /// In strict mode any missing key fails the call with
    /// `MissingVariable`; otherwise the missing keys are returned alongside
    /// the output.
    pub fn substitute(&self, template: &str, variables: &Variables) -> TemplateResult<Rendered> {
        let started = Instant::now();
        let rendered = substitute_variables(template, &self.defaults, variables);
        TemplateMetrics::record_render(started.elapsed());

        if !rendered.missing.is_empty() {
            TemplateMetrics::record_missing(rendered.missing.len());
            if self.strict {
                return Err(TemplateError::MissingVariable {
                    keys: rendered.missing,
                });
            }
        }

        Ok(rendered)
    }

    /// Load and substitute a template, returning the missing-key report
    pub fn render_report(&self, name: &str, options: &RenderOptions) -> TemplateResult<Rendered> {
        let body = self.store.load(name, &options.lang)?;
        self.substitute(&body, &options.variables)
    }

    /// Load and substitute a template.
    ///
    /// Missing keys are logged once per call in non-strict mode.
    pub fn compile_template(&self, name: &str, options: &RenderOptions) -> TemplateResult<String> {
        let rendered = self.render_report(name, options)?;
        self.warn_missing(name, &options.lang, &rendered.missing);
        Ok(rendered.output)
    }

    /// Compile the HTML body and subject line of a mail.
    ///
    /// The subject goes through the same interpolation as the body, so
    /// substituted values are HTML-escaped there too (`R&D` becomes
    /// `R&amp;D`). Missing keys of body and subject are logged together.
    pub fn compile_mail(&self, name: &str, options: &RenderOptions) -> TemplateResult<CompiledMail> {
        let body = self.render_report(name, options)?;

        let raw_subject = self.subjects.resolve(name, &options.lang);
        let subject = self.substitute(&raw_subject, &options.variables)?;

        let mut missing = body.missing;
        for key in subject.missing {
            if !missing.contains(&key) {
                missing.push(key);
            }
        }
        self.warn_missing(name, &options.lang, &missing);

        let lang = if options.lang.trim().is_empty() {
            self.default_lang.clone()
        } else {
            options.lang.clone()
        };

        Ok(CompiledMail {
            html: body.output,
            subject: subject.output,
            lang,
            missing,
        })
    }

    fn warn_missing(&self, name: &str, lang: &str, missing: &[String]) {
        if missing.is_empty() {
            return;
        }
        tracing::warn!(
            template = %name,
            lang = %lang,
            missing = %missing.join(", "),
            "Template rendered with missing variables"
        );
    }
}

fn validate_config(config: &TemplatesConfig) -> TemplateResult<()> {
    if !is_valid_language_tag(&config.default_lang) {
        return Err(TemplateError::InvalidConfig(format!(
            "default_lang {:?} is not a language tag",
            config.default_lang
        )));
    }

    if config.templates_path.as_os_str().is_empty() {
        return Err(TemplateError::InvalidConfig(
            "templates_path must not be empty".to_string(),
        ));
    }

    if let Some(key) = config.defaults.keys().find(|k| !is_valid_identifier(k)) {
        return Err(TemplateError::InvalidConfig(format!(
            "default key {:?} is not a valid placeholder name",
            key
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine(strict: bool) -> TemplateEngine {
        TemplateEngine::new(TemplatesConfig {
            default_lang: "en".to_string(),
            templates_path: "/nonexistent".into(),
            defaults: HashMap::new(),
            strict,
        })
        .unwrap()
    }

    #[test]
    fn test_compile_registered_template() {
        let engine = engine(false);
        engine.register_template_string("welcome", "Bonjour {{USER_NAME}}", "fr").unwrap();

        let html = engine
            .compile_template("welcome", &RenderOptions::new("fr").var("USER_NAME", "Alice"))
            .unwrap();
        assert_eq!(html, "Bonjour Alice");
    }

    #[test]
    fn test_non_strict_reports_missing() {
        let engine = engine(false);
        let rendered = engine
            .substitute("{{A}} {{B}}", &RenderOptions::default().var("A", "x").variables)
            .unwrap();

        assert_eq!(rendered.output, "x ");
        assert_eq!(rendered.missing, vec!["B"]);
    }

    #[test]
    fn test_strict_fails_on_missing() {
        let engine = engine(true);
        let result = engine.substitute("{{A}} {{B}}", &RenderOptions::default().var("A", "x").variables);

        match result {
            Err(TemplateError::MissingVariable { keys }) => assert_eq!(keys, vec!["B"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_builtin_defaults_available() {
        let engine = engine(true);
        let rendered = engine
            .substitute("{{APP_NAME}} {{CURRENT_YEAR}}", &Variables::new())
            .unwrap();

        assert_eq!(rendered.output, format!("Ara {}", Utc::now().year()));
    }

    #[test]
    fn test_configured_defaults_override_builtins() {
        let mut defaults = HashMap::new();
        defaults.insert("APP_NAME".to_string(), "Acme".to_string());
        let engine = TemplateEngine::new(TemplatesConfig {
            defaults,
            ..TemplatesConfig::default()
        })
        .unwrap();

        assert_eq!(engine.defaults()["APP_NAME"], "Acme");
        assert_eq!(engine.defaults()["SUPPORT_EMAIL"], "support@localhost");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad_lang = TemplatesConfig {
            default_lang: "english".to_string(),
            ..TemplatesConfig::default()
        };
        assert!(matches!(
            TemplateEngine::new(bad_lang),
            Err(TemplateError::InvalidConfig(_))
        ));

        let mut defaults = HashMap::new();
        defaults.insert("bad-key".to_string(), "x".to_string());
        let bad_key = TemplatesConfig {
            defaults,
            ..TemplatesConfig::default()
        };
        assert!(matches!(
            TemplateEngine::new(bad_key),
            Err(TemplateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_compile_mail_uses_subject_registry() {
        let engine = engine(false);
        engine.register_template_string("welcome", "<p>Hi {{USER_NAME}}</p>", "en").unwrap();
        engine.register_subject("welcome", "Welcome to {{APP_NAME}}, {{USER_NAME}}", "en").unwrap();

        let mail = engine
            .compile_mail("welcome", &RenderOptions::new("fr").var("USER_NAME", "Bob"))
            .unwrap();

        assert_eq!(mail.html, "<p>Hi Bob</p>");
        assert_eq!(mail.subject, "Welcome to Ara, Bob");
        assert_eq!(mail.lang, "fr");
    }

    #[test]
    fn test_compile_mail_reports_missing_keys_once() {
        let engine = engine(false);
        engine
            .register_template_string("invoice", "<p>{{USER_NAME}} owes {{AMOUNT}}</p>", "en")
            .unwrap();
        engine
            .register_subject("invoice", "Invoice {{INVOICE_ID}} for {{USER_NAME}}", "en")
            .unwrap();

        let mail = engine
            .compile_mail("invoice", &RenderOptions::new("en"))
            .unwrap();

        assert_eq!(mail.html, "<p> owes </p>");
        assert_eq!(mail.subject, "Invoice  for ");
        assert_eq!(mail.missing, vec!["USER_NAME", "AMOUNT", "INVOICE_ID"]);
    }

    #[test]
    fn test_compile_mail_escapes_subject_values() {
        let engine = engine(false);
        engine.register_template_string("team", "<p>{{TEAM}}</p>", "en").unwrap();
        engine.register_subject("team", "News from {{TEAM}}", "en").unwrap();

        let mail = engine
            .compile_mail("team", &RenderOptions::new("en").var("TEAM", "R&D"))
            .unwrap();

        assert_eq!(mail.html, "<p>R&amp;D</p>");
        assert_eq!(mail.subject, "News from R&amp;D");
        assert!(mail.missing.is_empty());
    }

    #[test]
    fn test_compile_mail_humanizes_missing_subject() {
        let engine = engine(false);
        engine.register_template_string("password-reset", "reset", "en").unwrap();

        let mail = engine
            .compile_mail("password-reset", &RenderOptions::default())
            .unwrap();
        assert_eq!(mail.subject, "Password Reset");
        assert_eq!(mail.lang, "en");
    }

    #[test]
    fn test_load_subject_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("fr-FR")).unwrap();
        fs::create_dir_all(dir.path().join("en")).unwrap();
        fs::write(
            dir.path().join("fr-FR").join(SUBJECTS_FILE),
            r#"{"welcome": "Bienvenue {{USER_NAME}}"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("en").join("welcome.xhtml"), "<p>{{USER_NAME}}</p>").unwrap();

        let engine = TemplateEngine::new(TemplatesConfig {
            templates_path: dir.path().to_path_buf(),
            ..TemplatesConfig::default()
        })
        .unwrap();
        assert_eq!(engine.load_subject_files().unwrap(), 1);

        let mail = engine
            .compile_mail("welcome", &RenderOptions::new("fr").var("USER_NAME", "Zoé"))
            .unwrap();
        assert_eq!(mail.subject, "Bienvenue Zoé");
        assert_eq!(mail.html, "<p>Zoé</p>");
    }

    #[test]
    fn test_load_subject_files_without_root() {
        assert_eq!(engine(false).load_subject_files().unwrap(), 0);
    }

    #[test]
    fn test_compile_template_propagates_lookup_errors() {
        let engine = engine(false);

        assert!(matches!(
            engine.compile_template("../x", &RenderOptions::default()),
            Err(TemplateError::InvalidTemplateName(_))
        ));
        assert!(matches!(
            engine.compile_template("absent", &RenderOptions::new("en").var("A", json!(1))),
            Err(TemplateError::TemplateNotFound { .. })
        ));
    }
}

//! Localized subject lines keyed like templates

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use dashmap::DashMap;

use super::language::{candidate_dirs, LanguageChain};
use super::types::{validate_template_name, TemplateError, TemplateResult};

/// Subject lines per (language directory, template name).
///
/// Lookups use the same candidate chain as templates, then fall back to a
/// humanized template name.
pub struct SubjectRegistry {
    default_lang: String,
    subjects: DashMap<(String, String), String>,
}

impl SubjectRegistry {
    pub fn new(default_lang: impl Into<String>) -> Self {
        Self {
            default_lang: default_lang.into(),
            subjects: DashMap::new(),
        }
    }

    /// Register the subject line for a template
    pub fn register(
        &self,
        name: &str,
        subject: impl Into<String>,
        lang: &str,
    ) -> TemplateResult<()> {
        validate_template_name(name)?;

        let lang = self.normalize_lang(lang);
        self.subjects
            .insert((lang, name.to_string()), subject.into());
        Ok(())
    }

    /// Load a JSON object mapping template names to subject lines.
    ///
    /// Returns the number of subjects registered.
    pub fn load_json(&self, lang: &str, path: impl AsRef<Path>) -> TemplateResult<usize> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let entries: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(io::Error::from)?;

        if let Some(name) = entries.keys().find(|name| validate_template_name(name).is_err()) {
            return Err(TemplateError::InvalidTemplateName(name.clone()));
        }

        let count = entries.len();
        for (name, subject) in entries {
            self.register(&name, subject, lang)?;
        }

        tracing::debug!(lang = %lang, path = %path.display(), count, "Loaded subject lines");
        Ok(count)
    }

    /// Raw subject for (name, lang), or the humanized name
    pub fn resolve(&self, name: &str, lang: &str) -> String {
        let lang = if lang.trim().is_empty() {
            self.default_lang.as_str()
        } else {
            lang
        };
        let chain = LanguageChain::new(lang, &self.default_lang);

        let subject = chain.iter().find_map(|candidate| {
            self.subjects
                .get(&(candidate.to_string(), name.to_string()))
                .map(|s| s.value().clone())
        });
        subject.unwrap_or_else(|| humanize(name))
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    fn normalize_lang(&self, lang: &str) -> String {
        let lang = if lang.trim().is_empty() {
            self.default_lang.as_str()
        } else {
            lang
        };
        candidate_dirs(lang)
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_lang.clone())
    }
}

/// Turn `password-reset` or `order_shipped` into a title-cased phrase
pub fn humanize(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("password-reset"), "Password Reset");
        assert_eq!(humanize("order_shipped"), "Order Shipped");
        assert_eq!(humanize("welcome"), "Welcome");
        assert_eq!(humanize("a--b"), "A B");
    }

    #[test]
    fn test_resolve_with_fallbacks() {
        let registry = SubjectRegistry::new("en");
        registry.register("welcome", "Welcome to {{APP_NAME}}", "en").unwrap();
        registry.register("welcome", "Bienvenue sur {{APP_NAME}}", "fr-FR").unwrap();

        assert_eq!(registry.resolve("welcome", "fr"), "Bienvenue sur {{APP_NAME}}");
        assert_eq!(registry.resolve("welcome", "de"), "Welcome to {{APP_NAME}}");
        assert_eq!(registry.resolve("welcome", ""), "Welcome to {{APP_NAME}}");
        assert_eq!(registry.resolve("password-reset", "fr"), "Password Reset");
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");
        fs::write(&path, r#"{"welcome": "Willkommen", "reset": "Passwort"}"#).unwrap();

        let registry = SubjectRegistry::new("en");
        assert_eq!(registry.load_json("de", &path).unwrap(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("reset", "de-DE"), "Passwort");
    }

    #[test]
    fn test_rejects_invalid_names() {
        let registry = SubjectRegistry::new("en");
        assert!(matches!(
            registry.register("../welcome", "x", "en"),
            Err(TemplateError::InvalidTemplateName(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");
        fs::write(&path, r#"{"welcome": "Hi", "a/b": "Nope"}"#).unwrap();

        assert!(registry.load_json("en", &path).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_json_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");
        fs::write(&path, "not json").unwrap();

        let registry = SubjectRegistry::new("en");
        assert!(registry.load_json("de", &path).is_err());
        assert!(registry.is_empty());
    }
}

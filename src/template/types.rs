//! Template types and error definitions

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid template name: {0:?}")]
    InvalidTemplateName(String),

    #[error("Template not found: {name} (lang: {lang})")]
    TemplateNotFound { name: String, lang: String },

    #[error("Missing template variables: {}", keys.join(", "))]
    MissingVariable { keys: Vec<String> },

    #[error("Invalid template engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Template storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Caller-supplied placeholder values for one render call.
///
/// `null` values are treated as absent.
pub type Variables = HashMap<String, serde_json::Value>;

/// Where the current body of a template comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateOrigin {
    Memory,
    Disk,
    None,
}

impl fmt::Display for TemplateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            TemplateOrigin::Memory => "memory",
            TemplateOrigin::Disk => "disk",
            TemplateOrigin::None => "none",
        };
        f.write_str(tag)
    }
}

/// Descriptor returned by `TemplateStore::info`
#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    /// Template name as requested
    pub name: String,

    /// Candidate directory the template resolved under, or the requested
    /// language when nothing matched
    pub lang: String,

    /// Whether any origin holds the template
    pub exists: bool,

    /// Origin of the current body
    pub origin: TemplateOrigin,

    /// Whether the resolved body currently sits in the cache
    pub cached: bool,

    /// File path for disk-backed templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Output of a render together with the placeholders that had no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    pub missing: Vec<String>,
}

/// A compiled mail body and subject line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledMail {
    pub html: String,
    pub subject: String,
    pub lang: String,
    /// Keys missing from body or subject, each listed once
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Validate a template name before it is used to build a path.
///
/// Rejects empty names, path separators and parent-directory sequences.
pub fn validate_template_name(name: &str) -> TemplateResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(TemplateError::InvalidTemplateName(name.to_string()));
    }

    Ok(())
}

/// Check that a key matches `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

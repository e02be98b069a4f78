//! Localized mail template system.
//!
//! This module provides:
//! - Template lookup across in-memory registrations, a resolved cache and
//!   `<templates_path>/<lang-dir>/<name>.xhtml` files, with language fallback
//! - Variable substitution with HTML-escaped values and a missing-key report
//! - Subject lines keyed like templates
//!
//! # Example
//!
//! ```ignore
//! let engine = TemplateEngine::new(TemplatesConfig::default())?;
//!
//! engine.register_template_string("welcome", "Bonjour {{USER_NAME}}", "fr")?;
//!
//! let html = engine.compile_template(
//!     "welcome",
//!     &RenderOptions::new("fr").var("USER_NAME", "Alice"),
//! )?;
//! assert_eq!(html, "Bonjour Alice");
//! ```

mod engine;
mod language;
mod store;
mod subjects;
mod substitution;
mod types;

pub use engine::{builtin_defaults, RenderOptions, TemplateEngine, SUBJECTS_FILE};
pub use language::{candidate_dirs, is_valid_language_tag, LanguageChain};
pub use store::{TemplateStore, TEMPLATE_EXTENSION};
pub use subjects::{humanize, SubjectRegistry};
pub use substitution::{escape_html, extract_placeholders, substitute_variables};
pub use types::{
    is_valid_identifier, validate_template_name, CompiledMail, Rendered, TemplateError,
    TemplateInfo, TemplateOrigin, TemplateResult, Variables,
};

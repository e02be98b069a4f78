//! Variable substitution engine for templates
//!
//! Placeholders are `{{IDENTIFIER}}` with optional spaces inside the
//! braces. Every substituted value is HTML-escaped; template markup is
//! left untouched.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::types::{Rendered, Variables};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{[ \t\r\n]*([a-zA-Z_][a-zA-Z0-9_]*)[ \t\r\n]*\}\}").unwrap();
}

/// Substitute placeholders using `variables` over `defaults`.
///
/// A key resolves to the caller's value when present and not `null`,
/// otherwise to the default. Keys with neither are replaced by an empty
/// string and reported in `missing` (deduplicated, first-seen order).
pub fn substitute_variables(
    template: &str,
    defaults: &HashMap<String, String>,
    variables: &Variables,
) -> Rendered {
    let mut missing: Vec<String> = Vec::new();

    let output = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let key = &caps[1];

        let value = variables
            .get(key)
            .and_then(value_to_string)
            .or_else(|| defaults.get(key).cloned());

        match value {
            Some(value) => escape_html(&value),
            None => {
                if !missing.iter().any(|k| k == key) {
                    missing.push(key.to_string());
                }
                String::new()
            }
        }
    });

    Rendered {
        output: output.into_owned(),
        missing,
    }
}

/// Distinct placeholder names in `template`, in first-seen order
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Escape `& < > " '` for safe inclusion in HTML text and attributes
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        // For arrays and objects, use JSON representation
        _ => Some(value.to_string()),
    }
}

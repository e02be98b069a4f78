//! Template engine integration tests
//!
//! These tests drive the public engine API against throwaway template
//! directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use serde_json::json;

use ara_mailer::config::{Settings, TemplatesConfig};
use ara_mailer::template::{
    RenderOptions, TemplateEngine, TemplateError, TemplateOrigin, Variables,
};

fn write_template(root: &Path, lang: &str, name: &str, body: &str) {
    let dir = root.join(lang);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}.xhtml", name)), body).unwrap();
}

fn engine_at(root: &Path, strict: bool) -> TemplateEngine {
    TemplateEngine::new(TemplatesConfig {
        default_lang: "en".to_string(),
        templates_path: root.to_path_buf(),
        defaults: Default::default(),
        strict,
    })
    .unwrap()
}

fn vars(value: serde_json::Value) -> Variables {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_memory_registration_wins_over_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "en", "welcome", "from disk");
    let engine = engine_at(dir.path(), false);

    assert_eq!(engine.load("welcome", "en").unwrap(), "from disk");
    engine.register_template_string("welcome", "from memory", "en").unwrap();

    assert_eq!(engine.load("welcome", "en").unwrap(), "from memory");
    assert_eq!(
        engine.template_info("welcome", "en").unwrap().origin,
        TemplateOrigin::Memory
    );
}

#[test]
fn test_repeated_loads_are_identical_and_cached() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "en-EN", "receipt", "Paid {{AMOUNT}}");
    let engine = engine_at(dir.path(), false);

    let first = engine.load("receipt", "en").unwrap();
    fs::remove_dir_all(dir.path().join("en-EN")).unwrap();
    let second = engine.load("receipt", "en").unwrap();

    assert_eq!(first, second);
    assert!(engine.template_info("receipt", "en").unwrap().cached);
}

#[test]
fn test_locale_variant_resolution() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "en-EN", "welcome", "hello");
    let engine = engine_at(dir.path(), false);

    assert_eq!(engine.load("welcome", "en").unwrap(), "hello");
    assert!(engine.template_exists("welcome", "es"));
}

#[test]
fn test_path_traversal_rejected_before_lookup() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("secret.xhtml"), "secret").unwrap();
    let engine = engine_at(&dir.path().join("en"), false);

    for name in ["../secret", "a/b"] {
        assert!(matches!(
            engine.load(name, "en"),
            Err(TemplateError::InvalidTemplateName(_))
        ));
        assert!(matches!(
            engine.template_info(name, "en"),
            Err(TemplateError::InvalidTemplateName(_))
        ));
    }
}

#[test]
fn test_value_escaping() {
    let engine = engine_at(Path::new("/nonexistent"), false);
    let rendered = engine
        .substitute(
            "Hi {{USER_NAME}}",
            &vars(json!({"USER_NAME": "<script>alert(1)</script>"})),
        )
        .unwrap();

    assert_eq!(rendered.output, "Hi &lt;script&gt;alert(1)&lt;/script&gt;");
}

#[test]
fn test_zero_is_not_missing() {
    let engine = engine_at(Path::new("/nonexistent"), true);
    let rendered = engine
        .substitute("{{COUNT}} items", &vars(json!({"COUNT": 0})))
        .unwrap();

    assert_eq!(rendered.output, "0 items");
    assert!(rendered.missing.is_empty());
}

#[test]
fn test_missing_variable_modes() {
    let lenient = engine_at(Path::new("/nonexistent"), false);
    let rendered = lenient
        .substitute("{{A}} {{B}}", &vars(json!({"A": "x"})))
        .unwrap();
    assert_eq!(rendered.output, "x ");
    assert_eq!(rendered.missing, vec!["B"]);

    let strict = engine_at(Path::new("/nonexistent"), true);
    match strict.substitute("{{A}} {{B}}", &vars(json!({"A": "x"}))) {
        Err(TemplateError::MissingVariable { keys }) => assert_eq!(keys, vec!["B"]),
        other => panic!("expected MissingVariable, got {:?}", other),
    }
}

#[test]
fn test_registered_french_welcome() {
    let engine = engine_at(Path::new("/nonexistent"), false);
    engine.register_template_string("welcome", "Bonjour {{USER_NAME}}", "fr").unwrap();

    let html = engine
        .compile_template("welcome", &RenderOptions::new("fr").var("USER_NAME", "Alice"))
        .unwrap();
    assert_eq!(html, "Bonjour Alice");
}

#[test]
fn test_scoped_invalidation_sees_disk_update() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "fr", "welcome", "Bonjour v1");
    let engine = engine_at(dir.path(), false);

    assert_eq!(engine.load("welcome", "fr").unwrap(), "Bonjour v1");

    engine.clear_template_cache("welcome", "fr");
    write_template(dir.path(), "fr", "welcome", "Bonjour v2");

    assert_eq!(engine.load("welcome", "fr").unwrap(), "Bonjour v2");
}

#[test]
fn test_failed_lookup_does_not_poison_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_at(dir.path(), false);

    assert!(engine.load("late", "en").is_err());
    write_template(dir.path(), "en", "late", "arrived");

    assert_eq!(engine.load("late", "en").unwrap(), "arrived");
}

#[test]
fn test_list_available_templates() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "en", "welcome", "");
    write_template(dir.path(), "en-GB", "receipt", "");
    write_template(dir.path(), "fr", "bienvenue", "");
    let engine = engine_at(dir.path(), false);
    engine.register_template_string("alert", "", "en").unwrap();

    assert_eq!(
        engine.list_available_templates("en").unwrap(),
        vec!["alert", "receipt", "welcome"]
    );
    assert_eq!(
        engine.list_available_templates("en").unwrap(),
        engine.list_available_templates("en").unwrap()
    );
}

#[test]
fn test_engines_do_not_share_caches() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "en", "welcome", "v1");
    let first = engine_at(dir.path(), false);
    let second = engine_at(dir.path(), false);

    assert_eq!(first.load("welcome", "en").unwrap(), "v1");
    write_template(dir.path(), "en", "welcome", "v2");

    assert_eq!(first.load("welcome", "en").unwrap(), "v1");
    assert_eq!(second.load("welcome", "en").unwrap(), "v2");
}

#[test]
fn test_concurrent_loads_agree() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "en", "welcome", "shared body");
    let engine = Arc::new(engine_at(dir.path(), false));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || engine.load("welcome", "en").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "shared body");
    }
    assert_eq!(engine.store().cached_count(), 1);
}

#[test]
fn test_compile_mail_with_disk_template_and_subject() {
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "en-EN",
        "order-shipped",
        "<p>Order {{ORDER_ID}} shipped. &copy; {{APP_NAME}}</p>",
    );
    let engine = engine_at(dir.path(), false);
    engine.register_subject("order-shipped", "Order {{ORDER_ID}} is on its way", "en").unwrap();

    let mail = engine
        .compile_mail(
            "order-shipped",
            &RenderOptions::new("de").var("ORDER_ID", "A&B-1"),
        )
        .unwrap();

    assert_eq!(mail.html, "<p>Order A&amp;B-1 shipped. &copy; Ara</p>");
    assert_eq!(mail.subject, "Order A&amp;B-1 is on its way");
    assert_eq!(mail.lang, "de");
}

#[test]
fn test_configured_defaults_override_builtins() {
    let settings = Settings::from_sources(
        vec![config::File::from_str(
            r#"{"templates": {"defaults": {"APP_NAME": "Acme", "SUPPORT_EMAIL": "help@acme.test"}}}"#,
            config::FileFormat::Json,
        )],
        config::Map::new(),
    )
    .unwrap();
    let engine = TemplateEngine::new(settings.templates).unwrap();

    let rendered = engine
        .substitute("{{APP_NAME}} <{{SUPPORT_EMAIL}}>", &Variables::new())
        .unwrap();
    assert_eq!(rendered.output, "Acme <help@acme.test>");
    assert!(rendered.missing.is_empty());
}

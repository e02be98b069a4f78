//! Language tag to candidate directory resolution

/// Locale directories tried for each bare language tag, in order
const LANGUAGE_CANDIDATES: &[(&str, &[&str])] = &[
    ("en", &["en", "en-EN", "en-US", "en-GB"]),
    ("fr", &["fr", "fr-FR", "fr-CA"]),
    ("es", &["es", "es-ES", "es-MX"]),
    ("de", &["de", "de-DE"]),
    ("it", &["it", "it-IT"]),
    ("pt", &["pt", "pt-PT", "pt-BR"]),
    ("nl", &["nl", "nl-NL"]),
];

/// Ordered candidate directories for a requested language plus the
/// engine default language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageChain {
    /// Candidates for the requested language
    pub requested: Vec<String>,
    /// Default-language candidates not already in `requested`
    pub fallback: Vec<String>,
}

impl LanguageChain {
    pub fn new(lang: &str, default_lang: &str) -> Self {
        let requested = candidate_dirs(lang);
        let fallback = candidate_dirs(default_lang)
            .into_iter()
            .filter(|c| !requested.contains(c))
            .collect();

        Self {
            requested,
            fallback,
        }
    }

    /// All candidates, requested first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.requested
            .iter()
            .chain(self.fallback.iter())
            .map(String::as_str)
    }
}

/// Expand a language tag into its candidate directory names.
///
/// A bare tag maps through the static table (unknown tags `xx` become
/// `[xx, xx-XX]`). A regional tag `ll-RR` tries itself first, then the
/// bare `ll` chain.
///
/// Candidates become directory names, so anything that is not a language
/// tag (`..`, `a/b`, empty) yields no candidates and resolution falls
/// through to the default language.
pub fn candidate_dirs(lang: &str) -> Vec<String> {
    let lang = lang.trim();
    if !is_valid_language_tag(lang) {
        return Vec::new();
    }

    let normalized = lang.replace('_', "-");
    let mut parts = normalized.splitn(2, '-');
    let base = parts.next().unwrap_or_default().to_ascii_lowercase();
    let region = parts.next().map(str::to_ascii_uppercase);

    let mut candidates = Vec::new();
    if let Some(region) = region {
        candidates.push(format!("{}-{}", base, region));
    }

    match LANGUAGE_CANDIDATES.iter().find(|(tag, _)| *tag == base) {
        Some((_, dirs)) => candidates.extend(dirs.iter().map(|d| d.to_string())),
        None => {
            candidates.push(base.clone());
            candidates.push(format!("{}-{}", base, base.to_ascii_uppercase()));
        }
    }

    let mut seen = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !seen.contains(&candidate) {
            seen.push(candidate);
        }
    }
    seen
}

/// Whether `lang` looks like `ll` or `ll-RR` (2-3 letter language,
/// optional 2-4 letter region, `-` or `_` separated)
pub fn is_valid_language_tag(lang: &str) -> bool {
    let normalized = lang.replace('_', "-");
    let mut parts = normalized.split('-');

    let base_ok = parts
        .next()
        .map(|b| (2..=3).contains(&b.len()) && b.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);

    let region_ok = match parts.next() {
        None => true,
        Some(r) => (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric()),
    };

    base_ok && region_ok && parts.next().is_none()
}

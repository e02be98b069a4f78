//! Template storage: in-memory registrations, resolved cache and disk files

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use super::language::{candidate_dirs, LanguageChain};
use super::types::{
    validate_template_name, TemplateError, TemplateInfo, TemplateOrigin, TemplateResult,
};
use crate::metrics::TemplateMetrics;

/// File extension of disk-backed templates
pub const TEMPLATE_EXTENSION: &str = "xhtml";

/// Composite (language directory, template name) key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TemplateKey {
    lang: String,
    name: String,
}

impl TemplateKey {
    fn new(lang: &str, name: &str) -> Self {
        Self {
            lang: lang.to_string(),
            name: name.to_string(),
        }
    }
}

/// Where a lookup landed, without reading the body
struct Located {
    candidate: String,
    origin: TemplateOrigin,
    cached: bool,
    path: Option<PathBuf>,
}

/// Template lookup across three tiers: in-memory registrations, resolved
/// cache, disk.
///
/// Each tier is searched across all candidates of the requested language
/// before the next tier, then the same again for the default language.
/// Memory entries never expire and are never shadowed by the cache. Disk
/// reads are memoized until `clear_cache` or `clear_template_cache`.
pub struct TemplateStore {
    templates_path: PathBuf,
    default_lang: String,
    memory: DashMap<TemplateKey, String>,
    cache: DashMap<TemplateKey, String>,
}

impl TemplateStore {
    /// Create a store reading `<templates_path>/<lang-dir>/<name>.xhtml`
    pub fn new(templates_path: impl Into<PathBuf>, default_lang: impl Into<String>) -> Self {
        Self {
            templates_path: templates_path.into(),
            default_lang: default_lang.into(),
            memory: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Root directory of disk-backed templates
    pub fn templates_path(&self) -> &Path {
        &self.templates_path
    }

    /// Language used when a lookup misses the requested one
    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Register a template body in memory, replacing any earlier
    /// registration for the same (lang, name).
    ///
    /// Names are checked like `load` checks them, so everything `list`
    /// reports can be loaded. A malformed `lang` registers under the
    /// default language.
    pub fn register(&self, name: &str, body: impl Into<String>, lang: &str) -> TemplateResult<()> {
        validate_template_name(name)?;

        let lang = self.normalize_lang(lang);
        tracing::debug!(template = %name, lang = %lang, "Registered in-memory template");
        self.memory.insert(TemplateKey::new(&lang, name), body.into());
        Ok(())
    }

    /// Load the current body for (name, lang).
    ///
    /// Requested-language candidates are searched before the default
    /// language's. Fails with `InvalidTemplateName` before touching the
    /// filesystem, and with `TemplateNotFound` once every candidate misses.
    pub fn load(&self, name: &str, lang: &str) -> TemplateResult<String> {
        validate_template_name(name)?;

        let lang = self.requested_lang(lang);
        let chain = LanguageChain::new(lang, &self.default_lang);

        if let Some(body) = self.lookup(name, &chain.requested) {
            return Ok(body);
        }

        if !chain.fallback.is_empty() {
            tracing::debug!(
                template = %name,
                lang = %lang,
                default_lang = %self.default_lang,
                "Falling back to default language"
            );
            if let Some(body) = self.lookup(name, &chain.fallback) {
                return Ok(body);
            }
        }

        TemplateMetrics::record_not_found();
        Err(TemplateError::TemplateNotFound {
            name: name.to_string(),
            lang: lang.to_string(),
        })
    }

    /// Whether (name, lang) resolves through any candidate.
    ///
    /// A successful check may populate the cache, as `load` would.
    pub fn exists(&self, name: &str, lang: &str) -> bool {
        self.load(name, lang).is_ok()
    }

    /// Describe where (name, lang) resolves without reading or caching it
    pub fn info(&self, name: &str, lang: &str) -> TemplateResult<TemplateInfo> {
        validate_template_name(name)?;

        let lang = self.requested_lang(lang);
        let chain = LanguageChain::new(lang, &self.default_lang);

        let located = self
            .locate(name, &chain.requested)
            .or_else(|| self.locate(name, &chain.fallback));

        Ok(match located {
            Some(found) => TemplateInfo {
                name: name.to_string(),
                lang: found.candidate,
                exists: true,
                origin: found.origin,
                cached: found.cached,
                path: found.path,
            },
            None => TemplateInfo {
                name: name.to_string(),
                lang: lang.to_string(),
                exists: false,
                origin: TemplateOrigin::None,
                cached: false,
                path: None,
            },
        })
    }

    /// Distinct template names available for `lang`, sorted.
    ///
    /// Covers `.xhtml` files in every candidate directory of the requested
    /// language plus in-memory registrations under those candidates. The
    /// default language is not consulted.
    pub fn list(&self, lang: &str) -> TemplateResult<Vec<String>> {
        let lang = self.requested_lang(lang);
        let candidates = candidate_dirs(lang);
        let mut names = BTreeSet::new();

        for candidate in &candidates {
            let dir = self.templates_path.join(candidate);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            for entry in entries {
                let path = entry?.path();
                if !path.is_file() {
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if validate_template_name(stem).is_ok() {
                        names.insert(stem.to_string());
                    }
                }
            }
        }

        for entry in self.memory.iter() {
            if candidates.contains(&entry.key().lang) {
                names.insert(entry.key().name.clone());
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Drop every cached disk read. In-memory registrations are kept.
    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::debug!(dropped, "Cleared template cache");
    }

    /// Drop cached reads of `name` for every candidate `lang` can resolve
    /// through, default-language fallbacks included
    pub fn clear_template_cache(&self, name: &str, lang: &str) {
        let lang = self.requested_lang(lang);
        let chain = LanguageChain::new(lang, &self.default_lang);

        for candidate in chain.iter() {
            self.cache.remove(&TemplateKey::new(candidate, name));
        }
        tracing::debug!(template = %name, lang = %lang, "Cleared cached template");
    }

    /// Number of cached disk reads
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of in-memory registrations
    pub fn registered_count(&self) -> usize {
        self.memory.len()
    }

    fn requested_lang<'a>(&'a self, lang: &'a str) -> &'a str {
        if lang.trim().is_empty() {
            &self.default_lang
        } else {
            lang
        }
    }

    fn normalize_lang(&self, lang: &str) -> String {
        candidate_dirs(self.requested_lang(lang))
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_lang.clone())
    }

    fn template_path(&self, candidate: &str, name: &str) -> PathBuf {
        self.templates_path
            .join(candidate)
            .join(format!("{}.{}", name, TEMPLATE_EXTENSION))
    }

    /// Memory for every candidate, then cache, then disk
    fn lookup(&self, name: &str, candidates: &[String]) -> Option<String> {
        let memory_hit = candidates
            .iter()
            .find_map(|candidate| self.memory.get(&TemplateKey::new(candidate, name)));
        if let Some(body) = memory_hit {
            TemplateMetrics::record_memory_hit();
            return Some(body.clone());
        }

        let cache_hit = candidates
            .iter()
            .find_map(|candidate| self.cache.get(&TemplateKey::new(candidate, name)));
        if let Some(body) = cache_hit {
            TemplateMetrics::record_cache_hit();
            return Some(body.clone());
        }

        for candidate in candidates {
            let path = self.template_path(candidate, name);
            match fs::read_to_string(&path) {
                Ok(body) => {
                    TemplateMetrics::record_disk_read();
                    tracing::debug!(
                        template = %name,
                        candidate = %candidate,
                        path = %path.display(),
                        "Loaded template from disk"
                    );
                    // First writer wins; disk content is immutable per key
                    let cached = self
                        .cache
                        .entry(TemplateKey::new(candidate, name))
                        .or_insert(body);
                    return Some(cached.clone());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(
                        template = %name,
                        path = %path.display(),
                        error = %e,
                        "Failed to read template file"
                    );
                }
            }
        }

        None
    }

    fn locate(&self, name: &str, candidates: &[String]) -> Option<Located> {
        let in_memory = candidates
            .iter()
            .find(|candidate| self.memory.contains_key(&TemplateKey::new(candidate, name)));
        if let Some(candidate) = in_memory {
            return Some(Located {
                candidate: candidate.clone(),
                origin: TemplateOrigin::Memory,
                cached: false,
                path: None,
            });
        }

        let cached = candidates
            .iter()
            .find(|candidate| self.cache.contains_key(&TemplateKey::new(candidate, name)));
        if let Some(candidate) = cached {
            return Some(Located {
                candidate: candidate.clone(),
                origin: TemplateOrigin::Disk,
                cached: true,
                path: Some(self.template_path(candidate, name)),
            });
        }

        candidates.iter().find_map(|candidate| {
            let path = self.template_path(candidate, name);
            path.is_file().then(|| Located {
                candidate: candidate.clone(),
                origin: TemplateOrigin::Disk,
                cached: false,
                path: Some(path),
            })
        })
    }
}

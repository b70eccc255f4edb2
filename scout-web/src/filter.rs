//! User-defined domain filters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Independent predicates; a domain must pass all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    pub exclude_digits: bool,
    pub only_com: bool,
    pub exclude_hyphens: bool,
    pub exclude_keywords: Vec<String>,
    /// Minimum length of the first label; 0 disables.
    pub min_length: usize,
    /// Maximum length of the first label; 0 disables.
    pub max_length: usize,
    /// Allowed final labels, e.g. `["com", "io"]`; empty allows all.
    pub allowed_extensions: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            exclude_digits: false,
            only_com: false,
            exclude_hyphens: false,
            exclude_keywords: Vec::new(),
            min_length: 0,
            max_length: 50,
            allowed_extensions: Vec::new(),
        }
    }
}

impl FilterSettings {
    fn keywords(&self) -> Vec<String> {
        self.exclude_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }

    fn extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

/// Keep the domains that pass every enabled predicate, preserving order and
/// dropping duplicates.
///
/// ```
/// use scout_web::filter::{apply_filters, FilterSettings};
///
/// let settings = FilterSettings { only_com: true, exclude_digits: true, ..Default::default() };
/// let input = vec!["a1.com".to_string(), "ab.com".into(), "ab.net".into()];
/// assert_eq!(apply_filters(&input, &settings), vec!["ab.com"]);
/// ```
pub fn apply_filters(domains: &[String], settings: &FilterSettings) -> Vec<String> {
    let keywords = settings.keywords();
    let extensions = settings.extensions();
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for domain in domains {
        if passes(domain, settings, &keywords, &extensions) && seen.insert(domain.as_str()) {
            kept.push(domain.clone());
        }
    }
    kept
}

fn passes(domain: &str, settings: &FilterSettings, keywords: &[String], extensions: &[String]) -> bool {
    let lower = domain.to_lowercase();
    let first = lower.split('.').next().unwrap_or_default();
    let first_len = first.chars().count();
    let last = lower.rsplit('.').next().unwrap_or_default();

    !(settings.exclude_digits && lower.chars().any(|c| c.is_ascii_digit()))
        && !(settings.only_com && !lower.ends_with(".com"))
        && !(settings.exclude_hyphens && lower.contains('-'))
        && !keywords.iter().any(|k| lower.contains(k.as_str()))
        && !(settings.min_length > 0 && first_len < settings.min_length)
        && !(settings.max_length > 0 && first_len > settings.max_length)
        && (extensions.is_empty() || extensions.iter().any(|e| e == last))
}

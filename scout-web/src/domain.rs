//! Domain-name normalization and validation.

use std::sync::LazyLock;

use regex::Regex;

/// Domain-shaped substrings inside free text.
static CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}")
        .expect("candidate regex compiles")
});

/// Cheap gate for generic container text.
static TLD_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:com|net|org|fr|io|co|uk|de|es|it)\b")
        .expect("tld hint regex compiles")
});

static VALID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*\.[a-z]{2,}$",
    )
    .expect("validation regex compiles")
});

/// Check an already-lowercased hostname against the label grammar.
///
/// ```
/// use scout_web::domain::is_valid_domain;
///
/// assert!(is_valid_domain("my-site.co.uk"));
/// assert!(!is_valid_domain("-bad.com"));
/// assert!(!is_valid_domain("localhost"));
/// ```
pub fn is_valid_domain(domain: &str) -> bool {
    (4..=253).contains(&domain.len())
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && domain.contains('.')
        && VALID.is_match(domain)
}

/// Reduce a URL-ish candidate to a bare hostname, or `None` if it is not one.
///
/// ```
/// use scout_web::domain::normalize;
///
/// assert_eq!(normalize(" HTTPS://www.Example.com:8080/a?b#c ").as_deref(), Some("example.com"));
/// assert_eq!(normalize("not a domain"), None);
/// ```
pub fn normalize(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_ascii_lowercase();
    let mut rest = match lowered.find("://") {
        Some(idx) => &lowered[idx + 3..],
        None => lowered.as_str(),
    };
    // Repeated so the result is a fixed point.
    while let Some(stripped) = rest.strip_prefix("www.") {
        rest = stripped;
    }
    let end = rest.find(['/', '?', '#', ':']).unwrap_or(rest.len());
    let host = &rest[..end];
    is_valid_domain(host).then(|| host.to_string())
}

/// Every valid domain mentioned in `text`, in order of appearance.
pub fn domains_in_text(text: &str) -> impl Iterator<Item = String> + '_ {
    CANDIDATE.find_iter(text).filter_map(|m| normalize(m.as_str()))
}

/// Whether `text` mentions a common top-level domain at a word boundary.
pub fn looks_domain_like(text: &str) -> bool {
    TLD_HINT.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_edges() {
        assert!(is_valid_domain("ab.cd"));
        assert!(!is_valid_domain("a.b"));
        assert!(!is_valid_domain("example.c"));
        assert!(!is_valid_domain("example.c0m"));
        assert!(!is_valid_domain("exa_mple.com"));
        assert!(!is_valid_domain("example-.com"));
        assert!(!is_valid_domain("a..com"));
        assert!(!is_valid_domain(".example.com"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
        assert!(is_valid_domain(&format!("{}.com", "a".repeat(63))));

        let long = format!("{}.com", vec!["a".repeat(60); 5].join("."));
        assert!(long.len() > 253);
        assert!(!is_valid_domain(&long));
    }

    #[test]
    fn normalize_strips_everything_but_the_host() {
        assert_eq!(normalize("http://shop.example.org/cart").as_deref(), Some("shop.example.org"));
        assert_eq!(normalize("example.net?x=1").as_deref(), Some("example.net"));
        assert_eq!(normalize("example.io#top").as_deref(), Some("example.io"));
        assert_eq!(normalize("WWW.EXAMPLE.DE").as_deref(), Some("example.de"));
        assert_eq!(normalize("192.168.0.1"), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "example.com",
            "www.www.example.com",
            "https://Sub.Example.COM/path",
            "a-b.c-d.travel",
        ] {
            let once = normalize(raw).unwrap();
            assert_eq!(normalize(&once).as_deref(), Some(once.as_str()), "{raw}");
        }
    }

    #[test]
    fn text_scan_finds_multiple_domains() {
        let found: Vec<_> =
            domains_in_text("Try https://www.alpha.com, beta.io or (Gamma.Co.UK).").collect();
        assert_eq!(found, vec!["alpha.com", "beta.io", "gamma.co.uk"]);
    }

    #[test]
    fn tld_hint_requires_word_boundary() {
        assert!(looks_domain_like("visit example.com today"));
        assert!(looks_domain_like("EXAMPLE.FR"));
        assert!(!looks_domain_like("the .community page"));
        assert!(!looks_domain_like("no domains here"));
    }
}

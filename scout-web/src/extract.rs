//! Domain extraction from a parsed HTML page.
//!
//! Candidates come from four independent passes over the DOM:
//!
//! 1. `a[href]`: the resolved link target's host, plus any domain named in
//!    the link text that is not the target itself or one of its parents
//! 2. `table td`, `table th`: cell text
//! 3. `ul li`, `ol li`: list-item text
//! 4. `div`, `span`, `p`: container text, skipped when the full text is longer
//!    than the configured limit and gated by a TLD heuristic
//!
//! Passes 2 to 4 ignore text inside `<a>` elements; links are owned by pass 1.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::domain::{domains_in_text, looks_domain_like, normalize};
use crate::page::PageSnapshot;

pub const DEFAULT_CONTAINER_TEXT_LIMIT: usize = 1000;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

static LINKS: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static CELLS: LazyLock<Selector> = LazyLock::new(|| selector("table td, table th"));
static ITEMS: LazyLock<Selector> = LazyLock::new(|| selector("ul li, ol li"));
static CONTAINERS: LazyLock<Selector> = LazyLock::new(|| selector("div, span, p"));

#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pub container_text_limit: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            container_text_limit: DEFAULT_CONTAINER_TEXT_LIMIT,
        }
    }
}

impl Extractor {
    pub fn new(container_text_limit: usize) -> Self {
        Self {
            container_text_limit,
        }
    }

    /// Validated, deduplicated, sorted domains referenced by `page`.
    ///
    /// ```
    /// use scout_web::{Extractor, PageSnapshot};
    ///
    /// let page = PageSnapshot::new(
    ///     None,
    ///     r#"<a href="https://Sub.Example.COM/path?x=1">Example.com</a>"#,
    /// );
    /// assert_eq!(Extractor::default().extract(&page), vec!["sub.example.com"]);
    /// ```
    pub fn extract(&self, page: &PageSnapshot) -> Vec<String> {
        self.extract_html(&page.html, page.url.as_ref())
    }

    pub fn extract_html(&self, html: &str, base: Option<&Url>) -> Vec<String> {
        let doc = Html::parse_document(html);
        let mut found = BTreeSet::new();

        for link in doc.select(&LINKS) {
            let target = link
                .value()
                .attr("href")
                .and_then(|href| resolve(href, base))
                .and_then(|url| url.host_str().and_then(normalize));
            let text: String = link.text().collect();
            for named in domains_in_text(text.trim()) {
                if !target.as_deref().is_some_and(|host| names_host(&named, host)) {
                    found.insert(named);
                }
            }
            if let Some(host) = target {
                found.insert(host);
            }
        }

        for el in doc.select(&CELLS).chain(doc.select(&ITEMS)) {
            if inside_link(&el) {
                continue;
            }
            found.extend(domains_in_text(text_outside_links(&el).trim()));
        }

        for el in doc.select(&CONTAINERS) {
            if inside_link(&el) {
                continue;
            }
            let full_len: usize = el.text().map(|t| t.chars().count()).sum();
            if full_len > self.container_text_limit {
                continue;
            }
            let text = text_outside_links(&el);
            let text = text.trim();
            if !text.is_empty() && looks_domain_like(text) {
                found.extend(domains_in_text(text));
            }
        }

        tracing::debug!(count = found.len(), "extract.done");
        found.into_iter().collect()
    }
}

fn resolve(href: &str, base: Option<&Url>) -> Option<Url> {
    match base {
        Some(base) => base.join(href.trim()).ok(),
        None => Url::parse(href.trim()).ok(),
    }
}

/// `named` is `host` itself or one of its parent domains.
fn names_host(named: &str, host: &str) -> bool {
    host == named
        || host
            .strip_suffix(named)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn inside_link(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(|n| n.value().as_element())
        .any(|e| e.name() == "a")
}

fn text_outside_links(el: &ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    out
}

fn collect_text(el: &ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if child_el.value().name() == "a" {
                out.push(' ');
            } else {
                collect_text(&child_el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

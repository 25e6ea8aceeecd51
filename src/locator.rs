//! Locator classification and resolution.
//!
//! Tracked pages are configured once by an operator and drift over time, so
//! resolution degrades through fallback chains instead of demanding exact
//! re-configuration. `resolve` returns `None` when nothing matches; the
//! caller decides whether that is a failure.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static ID_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([A-Za-z][\w-]*)").unwrap());
static CLASS_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.([A-Za-z][\w-]*)").unwrap());

/// Currency-shaped text: a symbol next to digits, or a two-decimal number
/// followed by a symbol.
static CURRENCY_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[€$£¥]\s*[0-9]|[0-9]+[.,][0-9]{2}\s*[€$£¥]").unwrap());

/// Bare identifiers that classify as a tag lookup rather than a CSS
/// selector. Matches the set of tags operators paste from inspectors.
const KNOWN_TAGS: &[&str] = &[
    "div", "span", "p", "h1", "h2", "h3", "h4", "h5", "strong", "em", "a",
    "button", "li", "ul", "ol", "table", "tr", "td",
];

/// How to find an element in a document.
///
/// Constructed once per tracked source via [`Locator::classify`] and
/// immutable thereafter; every consumer matches the closed set of variants
/// exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Locator {
    ById(String),
    ByClass(String),
    ByTag(String),
    ByCss(String),
    ByHtmlFragment(String),
}

impl Locator {
    /// Classify a raw operator-supplied string into a variant.
    ///
    /// Deterministic precedence: leading `#` is an id, leading `.` a class,
    /// a known bare tag name a tag, anything containing `<`/`>` a pasted
    /// HTML fragment, everything else a CSS selector.
    pub fn classify(raw: &str) -> Locator {
        let raw = raw.trim();

        if let Some(id) = raw.strip_prefix('#') {
            Locator::ById(id.to_string())
        } else if let Some(class) = raw.strip_prefix('.') {
            Locator::ByClass(class.to_string())
        } else if KNOWN_TAGS.contains(&raw.to_lowercase().as_str()) {
            Locator::ByTag(raw.to_lowercase())
        } else if raw.contains('<') && raw.contains('>') {
            Locator::ByHtmlFragment(raw.to_string())
        } else {
            Locator::ByCss(raw.to_string())
        }
    }

    /// The locator rendered back as a CSS selector string, used for the
    /// generic `select_one` fallback and for error messages.
    pub fn as_css(&self) -> String {
        match self {
            Locator::ById(id) => format!("#{id}"),
            Locator::ByClass(class) => format!(".{class}"),
            Locator::ByTag(tag) => tag.clone(),
            Locator::ByCss(css) => css.clone(),
            Locator::ByHtmlFragment(fragment) => fragment.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_css())
    }
}

/// Resolve a locator against a parsed document into zero-or-one element.
///
/// Never panics and never errors; `None` means no candidate survived any
/// fallback.
pub fn resolve<'a>(document: &'a Html, locator: &Locator) -> Option<ElementRef<'a>> {
    let found = match locator {
        Locator::ById(id) => find_by_id(document, id),
        Locator::ByClass(class) => find_by_class_token(document, class),
        Locator::ByTag(tag) => select_one(document, tag),
        Locator::ByCss(css) => return resolve_css(document, css),
        Locator::ByHtmlFragment(fragment) => return resolve_fragment(document, fragment),
    };

    // A structural miss still gets one shot as a plain CSS selector; the
    // raw string sometimes parses where the classified lookup came up
    // empty (e.g. ".price h1" classified as a class).
    found.or_else(|| select_one(document, &locator.as_css()))
}

fn select_one<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn elements<'a>(document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
}

fn find_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    elements(document).find(|el| el.value().attr("id") == Some(id))
}

/// Whole-token class match: `price` matches `class="product price sale"`
/// but not `class="pricey"`.
fn find_by_class_token<'a>(document: &'a Html, class: &str) -> Option<ElementRef<'a>> {
    elements(document).find(|el| el.value().classes().any(|c| c == class))
}

fn resolve_css<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    if let Some(element) = select_one(document, css) {
        return Some(element);
    }

    // Compound selector like ".price h1": anchor on the first part, then
    // walk the remaining parts down through the subtree.
    let parts: Vec<&str> = css.split_whitespace().collect();
    if parts.len() > 1 {
        let mut current = resolve_part(document, parts[0])?;
        for part in &parts[1..] {
            current = resolve_within(current, part)?;
        }
        return Some(current);
    }

    // Degrade a selector that neither parses nor matches to the first #id
    // or .class token it contains.
    if let Some(caps) = ID_TOKEN.captures(css) {
        if let Some(element) = find_by_id(document, &caps[1]) {
            return Some(element);
        }
    }
    if let Some(caps) = CLASS_TOKEN.captures(css) {
        if let Some(element) = find_by_class_token(document, &caps[1]) {
            return Some(element);
        }
    }

    None
}

fn resolve_part<'a>(document: &'a Html, part: &str) -> Option<ElementRef<'a>> {
    match Locator::classify(part) {
        Locator::ById(id) => find_by_id(document, &id),
        Locator::ByClass(class) => find_by_class_token(document, &class),
        Locator::ByTag(tag) => select_one(document, &tag),
        _ => select_one(document, part),
    }
}

fn resolve_within<'a>(scope: ElementRef<'a>, part: &str) -> Option<ElementRef<'a>> {
    let descendants = || scope.descendants().skip(1).filter_map(ElementRef::wrap);
    match Locator::classify(part) {
        Locator::ById(id) => descendants().find(|el| el.value().attr("id") == Some(id.as_str())),
        Locator::ByClass(class) => {
            descendants().find(|el| el.value().classes().any(|c| c == class))
        }
        Locator::ByTag(tag) => {
            let selector = Selector::parse(&tag).ok()?;
            scope.select(&selector).next()
        }
        _ => {
            let selector = Selector::parse(part).ok()?;
            scope.select(&selector).next()
        }
    }
}

/// Resolve a literal markup snippet pasted from a browser inspector.
///
/// Candidate signals are tried in priority order against the live document:
/// class tokens, id, microdata attributes, then the bare tag name. Headings
/// prefer product-title shaped elements first, and a snippet that mentions
/// "price" falls back to hunting for currency-looking text.
fn resolve_fragment<'a>(document: &'a Html, fragment: &str) -> Option<ElementRef<'a>> {
    let snippet = Html::parse_fragment(fragment);
    let first = snippet
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .next();

    if let Some(first) = first {
        let tag = first.value().name().to_lowercase();

        if matches!(tag.as_str(), "h1" | "h2" | "h3") {
            if let Some(element) = find_product_heading(document) {
                return Some(element);
            }
        }

        for class in first.value().classes() {
            if let Some(element) = find_by_class_token(document, class) {
                return Some(element);
            }
        }

        if let Some(id) = first.value().attr("id") {
            if let Some(element) = find_by_id(document, id) {
                return Some(element);
            }
        }

        for attr in ["itemprop", "itemtype"] {
            if let Some(value) = first.value().attr(attr) {
                if let Some(element) =
                    elements(document).find(|el| el.value().attr(attr) == Some(value))
                {
                    return Some(element);
                }
            }
        }

        if let Some(element) = select_one(document, &tag) {
            return Some(element);
        }
    }

    if fragment.to_lowercase().contains("price") {
        return find_currency_text(document);
    }

    None
}

/// Elements that look like a product title: `itemprop="name"`, or a heading
/// whose class or id mentions "title" or "product".
fn find_product_heading<'a>(document: &'a Html) -> Option<ElementRef<'a>> {
    if let Some(element) = elements(document).find(|el| el.value().attr("itemprop") == Some("name"))
    {
        return Some(element);
    }
    elements(document).find(|el| {
        matches!(el.value().name(), "h1" | "h2" | "h3") && {
            let mut hints = el.value().classes().map(str::to_lowercase).collect::<Vec<_>>();
            if let Some(id) = el.value().attr("id") {
                hints.push(id.to_lowercase());
            }
            hints
                .iter()
                .any(|h| h.contains("title") || h.contains("product"))
        }
    })
}

/// Last-resort price hunt: the first text node matching a currency-number
/// pattern, returned as its containing element.
fn find_currency_text<'a>(document: &'a Html) -> Option<ElementRef<'a>> {
    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            if CURRENCY_TEXT.is_match(text) {
                return node.parent().and_then(ElementRef::wrap);
            }
        }
    }
    None
}

/// Visible text of an element, whitespace-joined and trimmed.
pub fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//! Per-site offer extraction.
//!
//! Each supported site gets a [`SiteExtractor`]: a CSS selector that finds
//! the candidate offer fragments on a rendered page, and an `extract` that
//! maps one fragment to a [`RawOffer`]. Site layouts are fragile, so every
//! field falls back through selector alternatives and regex sweeps of the
//! fragment text; an item that still comes up empty is skipped and logged,
//! never aborting the batch.

pub mod amex;
pub mod bankofamerica;
pub mod groupon;
pub mod rakuten;

pub use amex::AmexExtractor;
pub use bankofamerica::BankOfAmericaExtractor;
pub use groupon::GrouponExtractor;
pub use rakuten::RakutenExtractor;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

use crate::entities::{OfferSource, RawOffer};

static EXPIRY_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)expires?\.?\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4})").unwrap());

static DATE_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{2,4}").unwrap());

/// One known site layout. Implementations are mechanically similar: a
/// fragment selector plus per-field extraction with fallbacks.
pub trait SiteExtractor: Send + Sync {
    fn source(&self) -> OfferSource;

    /// CSS selector for the candidate offer fragments on a page.
    fn offer_selector(&self) -> &'static str;

    /// Map one fragment to a raw offer. `None` drops the item.
    fn extract(&self, element: ElementRef<'_>, page_url: &Url) -> Option<RawOffer>;
}

/// Pick the extractor for a page URL, keyed on host and path patterns.
pub fn detect_extractor(url: &Url) -> Option<Box<dyn SiteExtractor>> {
    let host = url.host_str()?.to_lowercase();
    let path = url.path();

    if host.ends_with("americanexpress.com") && path.contains("/offers") {
        return Some(Box::new(AmexExtractor));
    }
    if host.ends_with("groupon.com") {
        return Some(Box::new(GrouponExtractor));
    }
    if host.ends_with("bankofamerica.com") && path.contains("deal") {
        return Some(Box::new(BankOfAmericaExtractor));
    }
    if host.ends_with("rakuten.com") {
        return Some(Box::new(RakutenExtractor));
    }
    None
}

/// Run the site-appropriate extractor over a rendered page. Unknown sites
/// yield an empty list.
pub fn extract_offers(html: &str, page_url: &Url) -> Vec<RawOffer> {
    match detect_extractor(page_url) {
        Some(extractor) => extract_with(extractor.as_ref(), html, page_url),
        None => {
            debug!(url = %page_url, "no extractor for this site");
            Vec::new()
        }
    }
}

/// Run one extractor over a page, skipping fragments that fail to yield a
/// usable offer.
pub fn extract_with(extractor: &dyn SiteExtractor, html: &str, page_url: &Url) -> Vec<RawOffer> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(extractor.offer_selector()) {
        Ok(selector) => selector,
        Err(err) => {
            warn!(source = %extractor.source(), error = ?err, "bad offer selector");
            return Vec::new();
        }
    };

    let mut offers = Vec::new();
    for element in document.select(&selector) {
        match extractor.extract(element, page_url) {
            Some(offer) => offers.push(offer),
            None => {
                debug!(source = %extractor.source(), "skipped fragment missing required fields");
            }
        }
    }
    debug!(source = %extractor.source(), count = offers.len(), "extracted offers");
    offers
}

/// --- shared field helpers ---

/// First non-empty text under any of the (comma-separated) selectors,
/// whitespace-collapsed.
pub(crate) fn select_text(element: ElementRef<'_>, selectors: &str) -> Option<String> {
    let selector = Selector::parse(selectors).ok()?;
    for found in element.select(&selector) {
        let text = collapse_text(found);
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// First non-empty attribute value under the selector.
pub(crate) fn select_attr(element: ElementRef<'_>, selectors: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selectors).ok()?;
    for found in element.select(&selector) {
        if let Some(value) = found.value().attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Fragment text with runs of whitespace collapsed to single spaces.
pub(crate) fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fragment text with line structure preserved, for first-line fallbacks.
pub(crate) fn raw_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// First line of the fragment that carries any text.
pub(crate) fn first_text_line(element: ElementRef<'_>) -> Option<String> {
    raw_text(element)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Pull an "Expires 12/31/2025"-style date out of free text, falling back
/// to any bare date token.
pub(crate) fn find_expiry_in_text(text: &str) -> Option<String> {
    if let Some(caps) = EXPIRY_IN_TEXT.captures(text) {
        return Some(caps[1].to_string());
    }
    DATE_IN_TEXT.find(text).map(|m| m.as_str().to_string())
}

/// Resolve a possibly-relative link against the page URL.
pub(crate) fn resolve_link(href: &str, page_url: &Url) -> Option<String> {
    page_url.join(href).ok().map(|url| url.to_string())
}

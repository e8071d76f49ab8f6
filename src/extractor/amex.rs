//! American Express card-offer page extraction.

use chrono::Utc;
use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;
use url::Url;

use crate::entities::{OfferSource, RawOffer};
use crate::extractor::{
    collapse_text, find_expiry_in_text, first_text_line, raw_text, select_attr, select_text,
    SiteExtractor,
};

/// Discount copy shapes seen on the offers page, most specific first.
static DISCOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Earn \d+% back on .+, up to a total of \$\d+").unwrap(),
        Regex::new(r"(?i)Earn \+\d+ Membership Rewards® points .+, up to \d+,?\d* pts").unwrap(),
        Regex::new(r"(?i)\d+%\s*back").unwrap(),
        Regex::new(r"(?i)\$\d+\s*off").unwrap(),
        Regex::new(r"(?i)save\s*\$\d+").unwrap(),
        Regex::new(r"(?i)\d+x\s*points").unwrap(),
    ]
});

pub struct AmexExtractor;

impl SiteExtractor for AmexExtractor {
    fn source(&self) -> OfferSource {
        OfferSource::Amex
    }

    fn offer_selector(&self) -> &'static str {
        r#"[data-locator-id="merchantOffer"]"#
    }

    fn extract(&self, element: ElementRef<'_>, page_url: &Url) -> Option<RawOffer> {
        let merchant_raw = extract_merchant(element)?;
        let discount_raw = extract_discount(element)?;

        Some(RawOffer {
            merchant_raw,
            discount_raw,
            description: extract_description(element),
            expiry_raw: extract_expiry(element),
            category: select_text(element, ".category, .offer-category")
                .unwrap_or_else(|| "General".to_string()),
            merchant_link: None,
            source: OfferSource::Amex,
            scraped_at: Utc::now(),
            page_url: page_url.to_string(),
        })
    }
}

fn extract_merchant(element: ElementRef<'_>) -> Option<String> {
    if let Some(name) = select_text(element, ".offer-info p.dls-gray-05") {
        return Some(name);
    }

    // Merchant logo alt text carries the name plus card-offer boilerplate
    if let Some(alt) = select_attr(element, "img[alt]", "alt") {
        let alt = alt.replace(" - New Card Offer", "").trim().to_string();
        if !alt.is_empty() {
            return Some(alt);
        }
    }

    first_text_line(element)
}

fn extract_discount(element: ElementRef<'_>) -> Option<String> {
    if let Some(discount) = select_text(element, ".offer-info p.heading-2") {
        return Some(discount);
    }

    let text = collapse_text(element);
    for pattern in DISCOUNT_PATTERNS.iter() {
        if let Some(found) = pattern.find(&text) {
            return Some(found.as_str().to_string());
        }
    }

    // Last resort: any line that smells like an amount
    raw_text(element)
        .lines()
        .map(str::trim)
        .find(|line| line.contains('%') || line.contains('$') || line.contains("points"))
        .map(str::to_string)
}

fn extract_description(element: ElementRef<'_>) -> String {
    if let Some(description) = select_text(element, ".description, .offer-description, .details") {
        return description;
    }
    let text = collapse_text(element);
    if text.chars().count() > 100 {
        let truncated: String = text.chars().take(100).collect();
        format!("{truncated}...")
    } else {
        text
    }
}

fn extract_expiry(element: ElementRef<'_>) -> Option<String> {
    if let Some(expiry) = select_text(element, r#"[data-testid="expirationDate"]"#) {
        return Some(expiry);
    }
    find_expiry_in_text(&collapse_text(element))
}

//! Groupon deal-card extraction.

use chrono::Utc;
use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;
use url::Url;

use crate::entities::{OfferSource, RawOffer};
use crate::extractor::{
    collapse_text, find_expiry_in_text, first_text_line, resolve_link, select_attr, select_text,
    SiteExtractor,
};

static DISCOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\d+%\s*off").unwrap(),
        Regex::new(r"(?i)save\s*(up to\s*)?\$\d+").unwrap(),
        Regex::new(r"(?i)buy one,? get one( free)?").unwrap(),
        Regex::new(r"(?i)from\s*\$\d+(\.\d{2})?").unwrap(),
    ]
});

pub struct GrouponExtractor;

impl SiteExtractor for GrouponExtractor {
    fn source(&self) -> OfferSource {
        OfferSource::Groupon
    }

    fn offer_selector(&self) -> &'static str {
        r#"[data-testid="deal-card"], .deal-card"#
    }

    fn extract(&self, element: ElementRef<'_>, page_url: &Url) -> Option<RawOffer> {
        let merchant_raw = select_text(element, r#".merchant-name, [data-testid="merchant-name"]"#)
            .or_else(|| select_attr(element, "img[alt]", "alt"))
            .or_else(|| first_text_line(element))?;

        let discount_raw = extract_discount(element)?;

        Some(RawOffer {
            merchant_raw,
            discount_raw,
            description: select_text(element, ".deal-title, .cui-dealcard-title")
                .unwrap_or_default(),
            expiry_raw: select_text(element, ".deal-expiry, .countdown-timer")
                .or_else(|| find_expiry_in_text(&collapse_text(element))),
            category: select_text(element, ".deal-category, .breadcrumb-category")
                .unwrap_or_else(|| "Local".to_string()),
            merchant_link: select_attr(element, "a.merchant-link, a[data-testid=\"deal-link\"]", "href")
                .and_then(|href| resolve_link(&href, page_url)),
            source: OfferSource::Groupon,
            scraped_at: Utc::now(),
            page_url: page_url.to_string(),
        })
    }
}

fn extract_discount(element: ElementRef<'_>) -> Option<String> {
    if let Some(discount) =
        select_text(element, ".discount-badge, .deal-price-discount, .cui-badge")
    {
        return Some(discount);
    }

    let text = collapse_text(element);
    DISCOUNT_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(&text))
        .map(|found| found.as_str().to_string())
}

//! Rakuten cash-back store-card extraction.

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

static CASH_BACK_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(up to\s*)?\d+(\.\d+)?%\s*cash\s*back").unwrap());

pub struct RakutenExtractor;

impl SiteExtractor for RakutenExtractor {
    fn source(&self) -> OfferSource {
        OfferSource::Rakuten
    }

    fn offer_selector(&self) -> &'static str {
        r#"[data-testid="store-card"], .store-card"#
    }

    fn extract(&self, element: ElementRef<'_>, page_url: &Url) -> Option<RawOffer> {
        let merchant_raw = select_text(element, ".store-name, [data-testid=\"store-name\"]")
            .or_else(|| select_attr(element, "img[alt]", "alt"))
            .or_else(|| first_text_line(element))?;

        let discount_raw = select_text(element, ".cash-back-rate, .store-rebate").or_else(|| {
            CASH_BACK_RATE
                .find(&collapse_text(element))
                .map(|found| found.as_str().to_string())
        })?;

        Some(RawOffer {
            merchant_raw,
            discount_raw,
            description: select_text(element, ".store-subtitle, .store-description")
                .unwrap_or_default(),
            // Portal rates rotate without posted end dates; a date only
            // shows up on limited-time boosts
            expiry_raw: find_expiry_in_text(&collapse_text(element)),
            category: select_text(element, ".store-category")
                .unwrap_or_else(|| "Shopping".to_string()),
            merchant_link: select_attr(element, "a.store-link, a[href]", "href")
                .and_then(|href| resolve_link(&href, page_url)),
            source: OfferSource::Rakuten,
            scraped_at: Utc::now(),
            page_url: page_url.to_string(),
        })
    }
}

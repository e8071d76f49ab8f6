//! BankAmeriDeals tile extraction.

use chrono::Utc;
use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;
use url::Url;

use crate::entities::{OfferSource, RawOffer};
use crate::extractor::{
    collapse_text, find_expiry_in_text, first_text_line, select_attr, select_text, SiteExtractor,
};

static CASH_BACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+%\s*cash\s*back").unwrap());

pub struct BankOfAmericaExtractor;

impl SiteExtractor for BankOfAmericaExtractor {
    fn source(&self) -> OfferSource {
        OfferSource::BankOfAmerica
    }

    fn offer_selector(&self) -> &'static str {
        r#".deal-tile, [data-component="deal-tile"]"#
    }

    fn extract(&self, element: ElementRef<'_>, page_url: &Url) -> Option<RawOffer> {
        let merchant_raw = select_text(element, ".deal-merchant-name, .merchant")
            .or_else(|| select_attr(element, ".deal-logo img[alt], img[alt]", "alt"))
            .or_else(|| first_text_line(element))?;

        let discount_raw = select_text(element, ".deal-offer-text, .deal-amount").or_else(|| {
            CASH_BACK
                .find(&collapse_text(element))
                .map(|found| found.as_str().to_string())
        })?;

        Some(RawOffer {
            merchant_raw,
            discount_raw,
            description: select_text(element, ".deal-description").unwrap_or_default(),
            // Tiles render "Exp. MM/DD/YY"; keep just the date token
            expiry_raw: select_text(element, ".deal-exp-date, .deal-expiration")
                .as_deref()
                .and_then(find_expiry_in_text)
                .or_else(|| find_expiry_in_text(&collapse_text(element))),
            category: select_text(element, ".deal-category")
                .unwrap_or_else(|| "General".to_string()),
            merchant_link: None,
            source: OfferSource::BankOfAmerica,
            scraped_at: Utc::now(),
            page_url: page_url.to_string(),
        })
    }
}

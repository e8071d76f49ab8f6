//! Merchant-name and discount-text normalization.
//!
//! Scraped field text arrives in whatever shape the source site rendered it:
//! logo alt-text with boilerplate suffixes, concatenated camelCase words,
//! discount copy with embedded expiry dates and call-to-action labels. These
//! routines reduce that to a canonical display form that the store can hash
//! for dedup. `standardize_merchant_name` is idempotent; re-normalizing an
//! already-normalized name is a no-op.

use regex::Regex;
use std::sync::LazyLock;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

static BOILERPLATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*(new card offer|promotional).*$").unwrap());

static DOMAIN_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(com|net|org|co|io)\b").unwrap());

static PLUS_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\+.*$").unwrap());

static BUNDLE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*&\s*(internet|cable|wireless|tv)\b.*$").unwrap());

static CATEGORY_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\s+(steakhouse|restaurant|bar|grill|hotel|resort|destination|apparel|clothing|merchandise|planning|service)s?\s*$",
    )
    .unwrap()
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static ADD_TO_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\badd to card\b:?").unwrap());

static EXPIRY_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bexpires?\s*:?\s*(\d{1,2}/\d{1,2}/\d{2,4}|[a-z]+\s+\d{1,2},?\s+\d{4})")
        .unwrap()
});

static BARE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap());

static CARD_OFFER_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[\w&'. ]*-\s*new card offer").unwrap());

static DOMAIN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[a-z0-9-]+\.(com|net|org|co|io)\b").unwrap());

/// Reduce a scraped merchant name to canonical display form:
/// "Best Buy - New Card Offer" -> "Best Buy", "oldnavy.com" -> "Oldnavy",
/// "HomeDepot" -> "Home Depot".
///
/// Word-splitting of concatenated camelCase runs against the raw input,
/// before lowercasing; the suffix strips loop to a fixed point so that the
/// whole transform is idempotent.
pub fn standardize_merchant_name(raw: &str) -> String {
    let name = CAMEL_BOUNDARY.replace_all(raw, "$1 $2").to_lowercase();
    let name = BOILERPLATE_SUFFIX.replace(&name, "").into_owned();
    let name = strip_to_fixpoint(&DOMAIN_SUFFIX, &name);
    let name = PLUS_FRAGMENT.replace(&name, "").into_owned();
    // Hyphens become spaces before the fragment strips so that forms like
    // "&-tv" or "-grill" are caught on the first pass.
    let name = name.replace('-', " ");
    let name = BUNDLE_FRAGMENT.replace(&name, "").into_owned();
    let name = strip_to_fixpoint(&CATEGORY_DESCRIPTOR, &name);
    let name = WHITESPACE.replace_all(name.trim(), " ").into_owned();
    title_case(&name)
}

/// Strip call-to-action and embedded-date boilerplate out of discount copy.
/// Returns an empty string for empty input.
pub fn clean_discount(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let text = ADD_TO_CARD.replace_all(raw, "");
    let text = CARD_OFFER_PHRASE.replace_all(&text, "");
    let text = EXPIRY_PHRASE.replace_all(&text, "");
    let text = BARE_DATE.replace_all(&text, "");
    let text = DOMAIN_TOKEN.replace_all(&text, "");
    let text = WHITESPACE.replace_all(text.trim(), " ");
    let text = text.trim();
    // A lone trailing period is left over from sentence-final boilerplate.
    text.strip_suffix('.').unwrap_or(text).trim_end().to_string()
}

fn strip_to_fixpoint(pattern: &Regex, input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = pattern.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

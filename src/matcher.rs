//! Heuristic matching between a visited hostname and stored offers.
//!
//! This is deliberately fuzzy string matching: merchant names rarely equal
//! hostnames exactly, so we try a few containment checks plus a small alias
//! table for brands whose domain drops the space. False positives and
//! negatives are expected and acceptable; the result only drives a
//! call-to-action affordance.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::entities::Offer;

static TLD_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(com|net|org|co|io)$").unwrap());

/// Sites we scrape offers *from*. The matcher is never meaningful on these,
/// so callers skip them entirely.
const DEAL_SITES: &[&str] = &[
    "americanexpress.com",
    "groupon.com",
    "bankofamerica.com",
    "rakuten.com",
    "chrome-extension:",
    "moz-extension:",
];

/// Brands whose web domain is not a straight concatenation of the display
/// name, or that go by a well-known short form.
const MERCHANT_ALIASES: &[(&str, &[&str])] = &[
    ("amazon", &["amazon", "amzn"]),
    ("old navy", &["oldnavy"]),
    ("best buy", &["bestbuy"]),
    ("home depot", &["homedepot"]),
    ("bed bath beyond", &["bedbathandbeyond", "bbby"]),
    ("jcpenney", &["jcpenney", "jcp"]),
    ("sams club", &["samsclub"]),
];

/// Lower-case and drop a leading `www.`.
pub fn normalize_hostname(hostname: &str) -> String {
    let host = hostname.trim().to_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

/// True when the host (or full URL) belongs to one of the scrape sources or
/// an extension origin.
pub fn is_deal_site(host_or_url: &str) -> bool {
    let lower = host_or_url.to_lowercase();
    DEAL_SITES.iter().any(|site| lower.contains(site))
}

/// Candidate spellings of a merchant name for hostname containment checks.
fn merchant_variations(merchant: &str) -> Vec<String> {
    let mut variations = Vec::new();
    let compact: String = merchant.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if !compact.is_empty() {
        variations.push(compact);
    }
    let no_space = merchant.replace(char::is_whitespace, "");
    if !no_space.is_empty() && !variations.contains(&no_space) {
        variations.push(no_space);
    }
    let hyphenated = merchant.split_whitespace().collect::<Vec<_>>().join("-");
    if hyphenated.contains('-') {
        variations.push(hyphenated);
    }
    for (key, aliases) in MERCHANT_ALIASES {
        if merchant.contains(key) {
            for alias in *aliases {
                if !variations.iter().any(|v| v == alias) {
                    variations.push((*alias).to_string());
                }
            }
        }
    }
    variations
}

/// Does this stored offer plausibly belong to the site at `hostname`?
pub fn is_offer_match(offer: &Offer, hostname: &str) -> bool {
    let host = normalize_hostname(hostname);
    if host.is_empty() {
        return false;
    }

    let merchant = offer.merchant.to_lowercase();
    if !merchant.is_empty() {
        let no_space = merchant.replace(char::is_whitespace, "");

        // Host contains the merchant name
        if !no_space.is_empty() && host.contains(&no_space) {
            return true;
        }

        // Merchant name contains the host, TLD stripped
        let host_sans_tld = TLD_SUFFIX.replace(&host, "");
        if !host_sans_tld.is_empty() && no_space.contains(host_sans_tld.as_ref()) {
            return true;
        }

        // Known alias spellings
        if merchant_variations(&merchant)
            .iter()
            .any(|variation| host.contains(variation))
        {
            return true;
        }
    }

    // Stored merchant link pointing at exactly this host
    if let Some(link) = &offer.merchant_link {
        if let Ok(url) = Url::parse(link) {
            if let Some(link_host) = url.host_str() {
                if normalize_hostname(link_host) == host {
                    return true;
                }
            }
        }
    }

    false
}

/// All stored offers matching the current host.
pub fn find_matching_offers<'a>(offers: &'a [Offer], hostname: &str) -> Vec<&'a Offer> {
    offers
        .iter()
        .filter(|offer| is_offer_match(offer, hostname))
        .collect()
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// --- Scrape sources ---

/// The sites we know how to scrape offers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferSource {
    #[serde(rename = "American Express")]
    Amex,
    #[serde(rename = "Groupon")]
    Groupon,
    #[serde(rename = "Bank of America")]
    BankOfAmerica,
    #[serde(rename = "Rakuten")]
    Rakuten,
}

impl OfferSource {
    /// Display name, as shown in the popup and stored in exports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Amex => "American Express",
            Self::Groupon => "Groupon",
            Self::BankOfAmerica => "Bank of America",
            Self::Rakuten => "Rakuten",
        }
    }

    /// Short lowercase slug used in generated offer ids.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Amex => "amex",
            Self::Groupon => "groupon",
            Self::BankOfAmerica => "boa",
            Self::Rakuten => "rakuten",
        }
    }
}

impl std::fmt::Display for OfferSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// --- Extraction output ---

/// A candidate offer as pulled straight off a page fragment. Field text is
/// whatever the site rendered; normalization happens at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOffer {
    pub merchant_raw: String,
    pub discount_raw: String,
    pub description: String,
    pub expiry_raw: Option<String>,
    pub category: String,
    pub merchant_link: Option<String>,
    pub source: OfferSource,
    pub scraped_at: DateTime<Utc>,
    pub page_url: String,
}

/// --- Persisted entities ---

/// A stored, normalized merchant discount record.
///
/// `hash` is the dedup identity key: at most one stored offer per
/// (normalized merchant, normalized discount, source) triple while
/// auto-dedup is on. `seen_count` only ever goes up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub hash: String,
    pub merchant: String,
    pub original_merchant: String,
    pub discount: String,
    pub original_discount: String,
    pub description: String,
    pub category: String,
    /// Raw expiry text as scraped, kept for display.
    pub expiry_date: Option<String>,
    /// Derived once from `expiry_date` at ingestion; never re-derived.
    pub parsed_expiry_date: Option<NaiveDate>,
    pub merchant_link: Option<String>,
    pub source: OfferSource,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub seen_count: u32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Tunables stored alongside the offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_dedup: bool,
    pub max_offers: usize,
    pub retention_days: i64,
    pub auto_delete_expired: bool,
    pub expired_grace_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_dedup: true,
            max_offers: 1000,
            retention_days: 90,
            auto_delete_expired: true,
            expired_grace_days: 1,
        }
    }
}

/// The full persisted database blob. Read whole, mutated in memory,
/// written back whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    pub offers: Vec<Offer>,
    /// Distinct merchant names seen at ingestion, in first-seen order.
    pub merchants: Vec<String>,
    /// Distinct categories seen at ingestion, in first-seen order.
    pub categories: Vec<String>,
    pub settings: Settings,
    pub last_cleanup: DateTime<Utc>,
    pub version: String,
}

impl StoreData {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            offers: Vec::new(),
            merchants: Vec::new(),
            categories: Vec::new(),
            settings: Settings::default(),
            last_cleanup: now,
            version: crate::store::SCHEMA_VERSION.to_string(),
        }
    }
}

/// Lightweight metadata blob, kept under its own storage key so the popup
/// can show counts without loading the full database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMeta {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub offer_count: usize,
    pub merchant_count: usize,
}

impl StoreMeta {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            version: crate::store::SCHEMA_VERSION.to_string(),
            created: now,
            last_accessed: now,
            offer_count: 0,
            merchant_count: 0,
        }
    }
}

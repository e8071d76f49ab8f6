use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dealstash::config::Config;
use dealstash::entities::{OfferSource, RawOffer};
use dealstash::store::{MemoryBackend, OfferStore};

/// Opt-in test logging: `RUST_LOG=dealstash=debug cargo test`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_config() -> Config {
    Config::new("unused.json", Duration::from_secs(2), 3, 1)
}

pub fn memory_store() -> OfferStore {
    OfferStore::new(Arc::new(MemoryBackend::new()), fast_config())
}

pub fn stored_offer(id: &str, merchant: &str, discount: &str) -> dealstash::entities::Offer {
    let now = Utc::now();
    dealstash::entities::Offer {
        id: id.to_string(),
        hash: dealstash::store::offer_hash(merchant, discount, OfferSource::Amex),
        merchant: merchant.to_string(),
        original_merchant: merchant.to_string(),
        discount: discount.to_string(),
        original_discount: discount.to_string(),
        description: String::new(),
        category: "General".to_string(),
        expiry_date: None,
        parsed_expiry_date: None,
        merchant_link: None,
        source: OfferSource::Amex,
        url: "https://global.americanexpress.com/offers/eligible".to_string(),
        created_at: now,
        last_seen: now,
        seen_count: 1,
        is_active: true,
        updated_at: None,
    }
}

pub fn raw_offer(merchant: &str, discount: &str) -> RawOffer {
    RawOffer {
        merchant_raw: merchant.to_string(),
        discount_raw: discount.to_string(),
        description: format!("{discount} at {merchant}"),
        expiry_raw: None,
        category: "General".to_string(),
        merchant_link: None,
        source: OfferSource::Amex,
        scraped_at: Utc::now(),
        page_url: "https://global.americanexpress.com/offers/eligible".to_string(),
    }
}

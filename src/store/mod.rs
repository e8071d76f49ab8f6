//! The persisted offer collection and its lifecycle: hashing-based dedup,
//! capacity eviction, retention/expiry cleanup, querying, stats and
//! export/import.
//!
//! The entire store is one JSON blob behind a [`StorageBackend`]: read in
//! full, mutated in memory, written back in full. Every mutating operation
//! holds the in-process write lock for its whole read-modify-write cycle so
//! interleaved calls cannot drop each other's writes. Storage calls are
//! bounded by a timeout so callers fail fast instead of hanging.

pub mod backend;
pub mod errors;
pub mod query;
pub mod retry;

pub use backend::{JsonFileBackend, MemoryBackend, StorageBackend};
pub use errors::StoreError;
pub use query::{OfferQuery, SortKey, SortOrder};

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use md5::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::dates::parse_expiration_date;
use crate::entities::{Offer, OfferSource, RawOffer, Settings, StoreData, StoreMeta};
use crate::normalize::{clean_discount, standardize_merchant_name};

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Storage key for the full database blob.
pub const DATABASE_KEY: &str = "dealstash_database";
/// Storage key for the lightweight metadata blob.
pub const META_KEY: &str = "dealstash_meta";
/// Storage key for the most-recent-scrape timestamp.
pub const LAST_SCRAPE_KEY: &str = "dealstash_last_scrape";

/// Result of ingesting one raw offer.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    Created(Offer),
    Updated(Offer),
}

impl AddOutcome {
    pub fn offer(&self) -> &Offer {
        match self {
            Self::Created(offer) | Self::Updated(offer) => offer,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_count: usize,
    pub retention_count: usize,
    pub remaining_offers: usize,
}

impl CleanupReport {
    pub fn cleaned(&self) -> usize {
        self.expired_count + self.retention_count
    }
}

/// Outcome of the opportunistic cleanup gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Ran(CleanupReport),
    /// Less than 24 hours since the previous cleanup.
    Skipped,
}

/// Aggregate counts shown in the popup header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_offers: usize,
    pub active_offers: usize,
    pub expired_offers: usize,
    pub merchants: usize,
    pub categories: usize,
    /// Offers last seen within the past 7 days.
    pub recent_offers: usize,
    /// Offers whose expiry date falls within the next 7 days.
    pub offers_expiring_next_week: usize,
    pub db_version: String,
    pub last_cleanup: DateTime<Utc>,
    pub retention_days: i64,
    pub auto_delete_expired: bool,
}

/// Full-state export envelope, also the accepted import format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub export_date: DateTime<Utc>,
    pub version: String,
    pub data: StoreData,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportSummary {
    pub imported_offers: usize,
}

/// Field-level merge applied by `update_offer`. Absent fields are left
/// untouched; `updated_at` is stamped on every successful update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferPatch {
    pub merchant: Option<String>,
    pub discount: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub expiry_date: Option<String>,
    pub parsed_expiry_date: Option<chrono::NaiveDate>,
    pub merchant_link: Option<String>,
    pub is_active: Option<bool>,
}

impl OfferPatch {
    fn apply(&self, offer: &mut Offer) {
        if let Some(merchant) = &self.merchant {
            offer.merchant = merchant.clone();
        }
        if let Some(discount) = &self.discount {
            offer.discount = discount.clone();
        }
        if let Some(description) = &self.description {
            offer.description = description.clone();
        }
        if let Some(category) = &self.category {
            offer.category = category.clone();
        }
        if let Some(expiry_date) = &self.expiry_date {
            offer.expiry_date = Some(expiry_date.clone());
        }
        if let Some(parsed) = self.parsed_expiry_date {
            offer.parsed_expiry_date = Some(parsed);
        }
        if let Some(link) = &self.merchant_link {
            offer.merchant_link = Some(link.clone());
        }
        if let Some(is_active) = self.is_active {
            offer.is_active = is_active;
        }
    }
}

/// Dedup identity key: md5 over the normalized merchant, normalized
/// discount and source, hex-encoded and truncated to 16 characters.
pub fn offer_hash(merchant: &str, discount: &str, source: OfferSource) -> String {
    let mut hasher = Context::new();
    hasher.consume(merchant.as_bytes());
    hasher.consume(b"-");
    hasher.consume(discount.as_bytes());
    hasher.consume(b"-");
    hasher.consume(source.name().as_bytes());
    let mut hex = format!("{:x}", hasher.compute());
    hex.truncate(16);
    hex
}

/// True when `now` is past the offer's expiry date plus the grace period.
/// The boundary is exclusive: at exactly expiry + grace the offer is still
/// live. Offers without a parsable expiry date never expire.
pub fn is_offer_expired(offer: &Offer, settings: &Settings, now: DateTime<Utc>) -> bool {
    let Some(expiry) = offer.parsed_expiry_date else {
        return false;
    };
    let delete_after = expiry.and_time(NaiveTime::MIN).and_utc()
        + chrono::Duration::days(settings.expired_grace_days);
    now > delete_after
}

fn cleanup_data(data: &mut StoreData, now: DateTime<Utc>) -> CleanupReport {
    let settings = data.settings.clone();
    let retention_cutoff = now - chrono::Duration::days(settings.retention_days);

    let mut expired_count = 0;
    let mut retention_count = 0;
    data.offers.retain(|offer| {
        if settings.auto_delete_expired && is_offer_expired(offer, &settings, now) {
            expired_count += 1;
            return false;
        }
        if offer.last_seen <= retention_cutoff {
            retention_count += 1;
            return false;
        }
        true
    });

    // The merchant/category registries only reflect surviving offers
    data.merchants = distinct(data.offers.iter().map(|o| o.merchant.clone()));
    data.categories = distinct(data.offers.iter().map(|o| o.category.clone()));
    data.last_cleanup = now;

    CleanupReport {
        expired_count,
        retention_count,
        remaining_offers: data.offers.len(),
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values {
        if !value.is_empty() && !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// The offer record store. Explicitly constructed with an injected
/// persistence backend; nothing here is global.
pub struct OfferStore {
    backend: Arc<dyn StorageBackend>,
    config: Config,
    write_lock: Mutex<()>,
}

impl OfferStore {
    pub fn new(backend: Arc<dyn StorageBackend>, config: Config) -> Self {
        Self {
            backend,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by a JSON file at the configured data path.
    pub fn with_file_backend(config: Config) -> Self {
        let backend = Arc::new(JsonFileBackend::new(config.data_path()));
        Self::new(backend, config)
    }

    /// Idempotent, bounded-retry initialization. Creates the initial schema
    /// when no metadata blob exists yet. The backing storage may not be
    /// ready at load time, so transient failures back off and retry up to
    /// the configured attempt count.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let max_attempts = self.config.init_max_attempts().max(1);
        for attempt in 0..max_attempts {
            match self.try_initialize().await {
                Ok(created) => {
                    if created {
                        info!("created initial store schema");
                    } else {
                        debug!("store already initialized");
                    }
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, error = %err, "store initialization attempt failed");
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(retry::init_backoff_delay(
                            attempt,
                            self.config.init_base_backoff_ms(),
                        ))
                        .await;
                    }
                }
            }
        }
        Err(StoreError::InitFailed {
            attempts: max_attempts,
        })
    }

    async fn try_initialize(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        if self.backend_load(META_KEY).await?.is_some() {
            return Ok(false);
        }
        let now = Utc::now();
        self.backend_store(DATABASE_KEY, serde_json::to_value(StoreData::initial(now))?)
            .await?;
        self.backend_store(META_KEY, serde_json::to_value(StoreMeta::initial(now))?)
            .await?;
        Ok(true)
    }

    /// Ingest one raw offer: normalize, dedup by hash, persist.
    ///
    /// A dedup hit bumps `last_seen` and `seen_count` and touches nothing
    /// else, preserving the originally stored text even if the scraped copy
    /// has drifted. A miss builds the full persisted record, registers its
    /// merchant and category, evicts the oldest-by-`last_seen` entries when
    /// over capacity, and opportunistically runs cleanup.
    pub async fn add_offer(&self, raw: &RawOffer) -> Result<AddOutcome, StoreError> {
        let now = Utc::now();
        let merchant = standardize_merchant_name(&raw.merchant_raw);
        let discount = clean_discount(&raw.discount_raw);
        let hash = offer_hash(&merchant, &discount, raw.source);

        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;

        let dedup_hit = if data.settings.auto_dedup {
            data.offers.iter_mut().find(|o| o.hash == hash).map(|existing| {
                existing.last_seen = now;
                existing.seen_count += 1;
                existing.clone()
            })
        } else {
            None
        };

        if let Some(updated) = dedup_hit {
            debug!(hash = %updated.hash, seen_count = updated.seen_count, "known offer, bumped last seen");
            self.save_data(&data).await?;
            return Ok(AddOutcome::Updated(updated));
        }

        let parsed_expiry_date = raw.expiry_raw.as_deref().and_then(parse_expiration_date);
        let offer = Offer {
            id: format!("{}-{}", raw.source.slug(), Uuid::new_v4()),
            hash,
            merchant: merchant.clone(),
            original_merchant: raw.merchant_raw.trim().to_string(),
            discount,
            original_discount: raw.discount_raw.trim().to_string(),
            description: raw.description.clone(),
            category: raw.category.clone(),
            expiry_date: raw.expiry_raw.clone(),
            parsed_expiry_date,
            merchant_link: raw.merchant_link.clone(),
            source: raw.source,
            url: raw.page_url.clone(),
            created_at: now,
            last_seen: now,
            seen_count: 1,
            is_active: true,
            updated_at: None,
        };
        data.offers.push(offer.clone());

        if !merchant.is_empty() && !data.merchants.contains(&merchant) {
            data.merchants.push(merchant);
        }
        if !raw.category.is_empty() && !data.categories.contains(&raw.category) {
            data.categories.push(raw.category.clone());
        }

        if data.offers.len() > data.settings.max_offers {
            let over = data.offers.len() - data.settings.max_offers;
            data.offers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
            data.offers.truncate(data.settings.max_offers);
            info!(evicted = over, "store over capacity, evicted oldest offers");
        }

        // Opportunistic cleanup, at most once per 24 hours
        if now - data.last_cleanup >= chrono::Duration::hours(24) {
            let report = cleanup_data(&mut data, now);
            if report.cleaned() > 0 {
                info!(
                    expired = report.expired_count,
                    stale = report.retention_count,
                    "auto-cleanup removed offers"
                );
            }
        }

        self.save_data(&data).await?;
        self.touch_meta(data.offers.len(), data.merchants.len()).await?;
        Ok(AddOutcome::Created(offer))
    }

    /// Sequential per-item ingestion; one item's failure never aborts the
    /// rest of the batch. Stamps the last-scrape timestamp when anything
    /// was saved.
    pub async fn add_offers(&self, raws: &[RawOffer]) -> Vec<Result<AddOutcome, StoreError>> {
        let mut results = Vec::with_capacity(raws.len());
        for raw in raws {
            let result = self.add_offer(raw).await;
            if let Err(err) = &result {
                warn!(merchant = %raw.merchant_raw, error = %err, "failed to save offer");
            }
            results.push(result);
        }
        if results.iter().any(Result::is_ok) {
            if let Err(err) = self.record_scrape().await {
                warn!(error = %err, "failed to record scrape timestamp");
            }
        }
        results
    }

    pub async fn get_all_offers(&self, query: &OfferQuery) -> Result<Vec<Offer>, StoreError> {
        let data = self.load_data().await?;
        Ok(query::apply(&data.offers, query))
    }

    pub async fn get_offer_by_id(&self, id: &str) -> Result<Option<Offer>, StoreError> {
        let data = self.load_data().await?;
        Ok(data.offers.into_iter().find(|o| o.id == id))
    }

    /// Merge the patch into the stored offer and stamp `updated_at`.
    pub async fn update_offer(&self, id: &str, patch: &OfferPatch) -> Result<Offer, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;
        let updated = {
            let offer = data
                .offers
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| StoreError::OfferNotFound(id.to_string()))?;
            patch.apply(offer);
            offer.updated_at = Some(Utc::now());
            offer.clone()
        };
        self.save_data(&data).await?;
        Ok(updated)
    }

    /// Remove one offer; returns the deleted record.
    pub async fn delete_offer(&self, id: &str) -> Result<Offer, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;
        let index = data
            .offers
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| StoreError::OfferNotFound(id.to_string()))?;
        let removed = data.offers.remove(index);
        self.save_data(&data).await?;
        self.touch_meta(data.offers.len(), data.merchants.len()).await?;
        Ok(removed)
    }

    /// Empty offers, merchants and categories; settings survive.
    pub async fn clear_all_offers(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;
        data.offers.clear();
        data.merchants.clear();
        data.categories.clear();
        self.save_data(&data).await?;
        self.touch_meta(0, 0).await?;
        info!("cleared all offers");
        Ok(())
    }

    /// Distinct categories across live offers, for the filter dropdown.
    pub async fn get_unique_categories(&self) -> Result<Vec<String>, StoreError> {
        let data = self.load_data().await?;
        Ok(distinct(data.offers.iter().map(|o| o.category.clone())))
    }

    /// Distinct source names across live offers, for the filter dropdown.
    pub async fn get_unique_sources(&self) -> Result<Vec<String>, StoreError> {
        let data = self.load_data().await?;
        Ok(distinct(data.offers.iter().map(|o| o.source.name().to_string())))
    }

    /// Remove expired offers (when auto-delete is on) and offers not seen
    /// within the retention window, then rebuild the merchant/category
    /// registries from the survivors.
    pub async fn cleanup(&self) -> Result<CleanupReport, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_data().await?;
        let report = cleanup_data(&mut data, Utc::now());
        self.save_data(&data).await?;
        self.touch_meta(data.offers.len(), data.merchants.len()).await?;
        info!(
            expired = report.expired_count,
            stale = report.retention_count,
            remaining = report.remaining_offers,
            "cleanup complete"
        );
        Ok(report)
    }

    /// Run `cleanup` only if 24 hours have elapsed since the last pass.
    pub async fn auto_cleanup_if_needed(&self) -> Result<CleanupOutcome, StoreError> {
        {
            let data = self.load_data().await?;
            if Utc::now() - data.last_cleanup < chrono::Duration::hours(24) {
                debug!("recent cleanup found, skipping");
                return Ok(CleanupOutcome::Skipped);
            }
        }
        Ok(CleanupOutcome::Ran(self.cleanup().await?))
    }

    pub async fn get_stats(&self) -> Result<StoreStats, StoreError> {
        let data = self.load_data().await?;
        let meta = self.load_meta().await?;
        let now = Utc::now();
        let today = now.date_naive();
        let week_ago = now - chrono::Duration::days(7);

        let expired_offers = data
            .offers
            .iter()
            .filter(|o| is_offer_expired(o, &data.settings, now))
            .count();
        let offers_expiring_next_week = data
            .offers
            .iter()
            .filter(|o| {
                o.parsed_expiry_date.is_some_and(|expiry| {
                    expiry > today && expiry <= today + chrono::Duration::days(7)
                })
            })
            .count();

        Ok(StoreStats {
            total_offers: data.offers.len(),
            active_offers: data.offers.iter().filter(|o| o.is_active).count(),
            expired_offers,
            merchants: data.merchants.len(),
            categories: data.categories.len(),
            recent_offers: data.offers.iter().filter(|o| o.last_seen >= week_ago).count(),
            offers_expiring_next_week,
            db_version: meta.version,
            last_cleanup: data.last_cleanup,
            retention_days: data.settings.retention_days,
            auto_delete_expired: data.settings.auto_delete_expired,
        })
    }

    /// Full-state export in the shape `import_data` accepts.
    pub async fn export_data(&self) -> Result<ExportPayload, StoreError> {
        let data = self.load_data().await?;
        let meta = self.load_meta().await?;
        Ok(ExportPayload {
            export_date: Utc::now(),
            version: meta.version,
            data,
        })
    }

    /// Replace the full store state from an export payload. Fails fast —
    /// before any write — when the payload is missing its version tag or
    /// data payload, or when the data does not deserialize.
    pub async fn import_data(&self, payload: &Value) -> Result<ImportSummary, StoreError> {
        if payload.get("version").is_none() {
            return Err(StoreError::InvalidImport("missing version tag"));
        }
        let Some(data_value) = payload.get("data") else {
            return Err(StoreError::InvalidImport("missing data payload"));
        };
        let data: StoreData = serde_json::from_value(data_value.clone())?;

        let _guard = self.write_lock.lock().await;
        let imported_offers = data.offers.len();
        let merchant_count = data.merchants.len();
        self.save_data(&data).await?;
        self.touch_meta(imported_offers, merchant_count).await?;
        info!(imported_offers, "imported store data");
        Ok(ImportSummary { imported_offers })
    }

    /// Stamp the most-recent-scrape timestamp.
    pub async fn record_scrape(&self) -> Result<(), StoreError> {
        self.backend_store(LAST_SCRAPE_KEY, Value::String(Utc::now().to_rfc3339()))
            .await
    }

    pub async fn last_scrape(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.backend_load(LAST_SCRAPE_KEY).await?.and_then(|value| {
            value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }

    /// --- blob plumbing ---

    async fn load_data(&self) -> Result<StoreData, StoreError> {
        match self.backend_load(DATABASE_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(StoreData::initial(Utc::now())),
        }
    }

    async fn save_data(&self, data: &StoreData) -> Result<(), StoreError> {
        self.backend_store(DATABASE_KEY, serde_json::to_value(data)?)
            .await
    }

    async fn load_meta(&self) -> Result<StoreMeta, StoreError> {
        match self.backend_load(META_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(StoreMeta::initial(Utc::now())),
        }
    }

    async fn touch_meta(&self, offer_count: usize, merchant_count: usize) -> Result<(), StoreError> {
        let mut meta = self.load_meta().await?;
        meta.offer_count = offer_count;
        meta.merchant_count = merchant_count;
        meta.last_accessed = Utc::now();
        self.backend_store(META_KEY, serde_json::to_value(meta)?)
            .await
    }

    async fn backend_load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match tokio::time::timeout(self.config.storage_timeout(), self.backend.load(key)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::Backend(err)),
            Err(_) => Err(StoreError::Timeout),
        }
    }

    async fn backend_store(&self, key: &str, value: Value) -> Result<(), StoreError> {
        match tokio::time::timeout(self.config.storage_timeout(), self.backend.store(key, value))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(StoreError::Backend(err)),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

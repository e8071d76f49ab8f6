mod helpers;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use dealstash::entities::{Settings, StoreData};
use dealstash::store::{
    AddOutcome, CleanupOutcome, ExportPayload, MemoryBackend, OfferQuery, OfferStore, OfferPatch,
    StoreError, SCHEMA_VERSION,
};

use helpers::{fast_config, memory_store, raw_offer, stored_offer};

/// Import a crafted database blob so tests can start from non-default
/// settings or pre-aged offers.
async fn import_state(store: &OfferStore, data: StoreData) {
    let payload = ExportPayload {
        export_date: Utc::now(),
        version: SCHEMA_VERSION.to_string(),
        data,
    };
    store
        .import_data(&serde_json::to_value(&payload).unwrap())
        .await
        .unwrap();
}

fn state_with_settings(settings: Settings) -> StoreData {
    let mut data = StoreData::initial(Utc::now());
    data.settings = settings;
    data
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let store = memory_store();
    store.initialize().await.unwrap();
    store.initialize().await.unwrap();

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total_offers, 0);
    assert_eq!(stats.db_version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_dedup_bumps_seen_count_and_keeps_id() {
    let store = memory_store();
    store.initialize().await.unwrap();

    let raw = raw_offer("Best Buy - New Card Offer", "Add to Card Earn 5% back");
    let first = store.add_offer(&raw).await.unwrap();
    let second = store.add_offer(&raw).await.unwrap();

    assert!(first.is_created());
    let AddOutcome::Updated(updated) = second else {
        panic!("second ingestion should dedup");
    };
    assert_eq!(updated.id, first.offer().id);
    assert_eq!(updated.seen_count, 2);
    assert!(updated.last_seen >= first.offer().last_seen);

    let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert_eq!(offers.len(), 1);
    // Normalization happened at ingestion
    assert_eq!(offers[0].merchant, "Best Buy");
    assert_eq!(offers[0].discount, "Earn 5% back");
    assert_eq!(offers[0].original_merchant, "Best Buy - New Card Offer");
}

#[tokio::test]
async fn test_dedup_disabled_creates_duplicates() {
    let store = memory_store();
    store.initialize().await.unwrap();
    import_state(
        &store,
        state_with_settings(Settings {
            auto_dedup: false,
            ..Settings::default()
        }),
    )
    .await;

    let raw = raw_offer("Target", "10% off");
    assert!(store.add_offer(&raw).await.unwrap().is_created());
    assert!(store.add_offer(&raw).await.unwrap().is_created());

    let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_ne!(offers[0].id, offers[1].id);
}

#[tokio::test]
async fn test_capacity_evicts_oldest_by_last_seen() {
    let store = memory_store();
    store.initialize().await.unwrap();
    import_state(
        &store,
        state_with_settings(Settings {
            max_offers: 3,
            ..Settings::default()
        }),
    )
    .await;

    for i in 0..5 {
        let raw = raw_offer(&format!("Merchant {i}"), &format!("{i}% off"));
        store.add_offer(&raw).await.unwrap();
    }

    let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert_eq!(offers.len(), 3);

    let merchants: Vec<&str> = offers.iter().map(|o| o.merchant.as_str()).collect();
    assert_eq!(merchants, ["Merchant 4", "Merchant 3", "Merchant 2"]);
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let store = memory_store();
    store.initialize().await.unwrap();
    store
        .add_offer(&raw_offer("Best Buy", "5% back"))
        .await
        .unwrap();
    store.add_offer(&raw_offer("Target", "$10 off")).await.unwrap();

    let export = store.export_data().await.unwrap();

    let restored = memory_store();
    restored.initialize().await.unwrap();
    let summary = restored
        .import_data(&serde_json::to_value(&export).unwrap())
        .await
        .unwrap();
    assert_eq!(summary.imported_offers, 2);

    let original = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    let round_tripped = restored.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert_eq!(original.len(), round_tripped.len());
    for (a, b) in original.iter().zip(round_tripped.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.merchant, b.merchant);
        assert_eq!(a.last_seen, b.last_seen);
    }

    let reexport = restored.export_data().await.unwrap();
    assert_eq!(
        serde_json::to_value(&export.data).unwrap(),
        serde_json::to_value(&reexport.data).unwrap()
    );
}

#[tokio::test]
async fn test_import_rejects_malformed_payloads() {
    let store = memory_store();
    store.initialize().await.unwrap();
    store.add_offer(&raw_offer("Keep Me", "1% off")).await.unwrap();

    let missing_data = json!({"version": "1.0.0"});
    let err = store.import_data(&missing_data).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidImport(_)));

    let missing_version = json!({"data": {"offers": []}});
    let err = store.import_data(&missing_version).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidImport(_)));

    // Failed imports write nothing
    let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].merchant, "Keep Me");
}

#[tokio::test]
async fn test_cleanup_removes_expired_and_stale_offers() {
    let store = memory_store();
    store.initialize().await.unwrap();

    let now = Utc::now();
    let mut data = StoreData::initial(now);

    let live = stored_offer("amex-live", "Fresh", "5% back");
    data.offers.push(live);

    let mut expired = stored_offer("amex-expired", "Gone", "10% off");
    expired.parsed_expiry_date = Some(now.date_naive() - ChronoDuration::days(30));
    expired.expiry_date = Some("old".to_string());
    data.offers.push(expired);

    let mut stale = stored_offer("amex-stale", "Dusty", "15% off");
    stale.last_seen = now - ChronoDuration::days(120);
    data.offers.push(stale);

    data.merchants = vec!["Fresh".into(), "Gone".into(), "Dusty".into()];
    data.categories = vec!["General".into()];
    import_state(&store, data).await;

    let report = store.cleanup().await.unwrap();
    assert_eq!(report.expired_count, 1);
    assert_eq!(report.retention_count, 1);
    assert_eq!(report.remaining_offers, 1);

    let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].merchant, "Fresh");

    // Registries rebuilt from survivors only
    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.merchants, 1);
}

#[tokio::test]
async fn test_auto_cleanup_gates_on_24_hours() {
    let store = memory_store();
    store.initialize().await.unwrap();

    // Fresh schema: last_cleanup is now, so the pass is skipped
    assert_eq!(
        store.auto_cleanup_if_needed().await.unwrap(),
        CleanupOutcome::Skipped
    );

    let mut data = StoreData::initial(Utc::now());
    data.last_cleanup = Utc::now() - ChronoDuration::days(2);
    import_state(&store, data).await;

    match store.auto_cleanup_if_needed().await.unwrap() {
        CleanupOutcome::Ran(report) => assert_eq!(report.remaining_offers, 0),
        CleanupOutcome::Skipped => panic!("cleanup should have run after 2 days"),
    }

    // And the pass just now re-arms the gate
    assert_eq!(
        store.auto_cleanup_if_needed().await.unwrap(),
        CleanupOutcome::Skipped
    );
}

#[tokio::test]
async fn test_stats_counts() {
    let store = memory_store();
    store.initialize().await.unwrap();

    let now = Utc::now();
    let mut data = StoreData::initial(now);

    let active = stored_offer("amex-a", "Alpha", "5% back");
    data.offers.push(active);

    let mut inactive = stored_offer("amex-b", "Beta", "10% off");
    inactive.is_active = false;
    inactive.last_seen = now - ChronoDuration::days(30);
    data.offers.push(inactive);

    let mut expiring = stored_offer("amex-c", "Gamma", "$5 off");
    expiring.parsed_expiry_date = Some(now.date_naive() + ChronoDuration::days(3));
    data.offers.push(expiring);

    let mut expired = stored_offer("amex-d", "Delta", "$9 off");
    expired.parsed_expiry_date = Some(now.date_naive() - ChronoDuration::days(10));
    data.offers.push(expired);

    data.merchants = vec!["Alpha".into(), "Beta".into(), "Gamma".into(), "Delta".into()];
    data.categories = vec!["General".into()];
    import_state(&store, data).await;

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total_offers, 4);
    assert_eq!(stats.active_offers, 3);
    assert_eq!(stats.expired_offers, 1);
    assert_eq!(stats.merchants, 4);
    assert_eq!(stats.categories, 1);
    // Everyone but Beta was seen within the week
    assert_eq!(stats.recent_offers, 3);
    assert_eq!(stats.offers_expiring_next_week, 1);
    assert_eq!(stats.retention_days, 90);
    assert!(stats.auto_delete_expired);
}

#[tokio::test]
async fn test_update_delete_and_get_by_id() {
    let store = memory_store();
    store.initialize().await.unwrap();

    let created = store
        .add_offer(&raw_offer("Target", "10% off"))
        .await
        .unwrap();
    let id = created.offer().id.clone();

    let patch = OfferPatch {
        is_active: Some(false),
        description: Some("seasonal".to_string()),
        ..OfferPatch::default()
    };
    let updated = store.update_offer(&id, &patch).await.unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.description, "seasonal");
    assert!(updated.updated_at.is_some());

    let fetched = store.get_offer_by_id(&id).await.unwrap().unwrap();
    assert!(!fetched.is_active);

    let deleted = store.delete_offer(&id).await.unwrap();
    assert_eq!(deleted.id, id);
    assert!(store.get_offer_by_id(&id).await.unwrap().is_none());

    let err = store.delete_offer(&id).await.unwrap_err();
    assert!(matches!(err, StoreError::OfferNotFound(_)));
    let err = store.update_offer(&id, &OfferPatch::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::OfferNotFound(_)));
}

#[tokio::test]
async fn test_clear_preserves_settings() {
    let store = memory_store();
    store.initialize().await.unwrap();
    import_state(
        &store,
        state_with_settings(Settings {
            max_offers: 5,
            ..Settings::default()
        }),
    )
    .await;
    store.add_offer(&raw_offer("Target", "10% off")).await.unwrap();

    store.clear_all_offers().await.unwrap();

    let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
    assert!(offers.is_empty());
    assert!(store.get_unique_categories().await.unwrap().is_empty());

    let export = store.export_data().await.unwrap();
    assert_eq!(export.data.settings.max_offers, 5);
}

#[tokio::test]
async fn test_add_offers_records_scrape_timestamp() {
    let store = memory_store();
    store.initialize().await.unwrap();
    assert!(store.last_scrape().await.unwrap().is_none());

    let results = store
        .add_offers(&[
            raw_offer("Best Buy", "5% back"),
            raw_offer("Target", "10% off"),
        ])
        .await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(Result::is_ok));

    let last_scrape = store.last_scrape().await.unwrap().unwrap();
    assert!(Utc::now() - last_scrape < ChronoDuration::minutes(1));
}

#[tokio::test]
async fn test_unique_sources_and_categories() {
    let store = memory_store();
    store.initialize().await.unwrap();

    let mut travel = raw_offer("Delta", "2x miles");
    travel.category = "Travel".to_string();
    store.add_offer(&travel).await.unwrap();
    store.add_offer(&raw_offer("Target", "10% off")).await.unwrap();
    store.add_offer(&raw_offer("Best Buy", "5% back")).await.unwrap();

    let categories = store.get_unique_categories().await.unwrap();
    assert_eq!(categories, vec!["Travel".to_string(), "General".to_string()]);

    let sources = store.get_unique_sources().await.unwrap();
    assert_eq!(sources, vec!["American Express".to_string()]);
}

/// Storage failure paths: a backend that never answers trips the timeout,
/// and one that always errors exhausts the bounded init retries.
mod failures {
    use super::*;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use dealstash::config::Config;
    use dealstash::store::StorageBackend;
    use mockall::mock;
    use serde_json::Value;
    use std::time::Duration;

    mock! {
        Backend {}

        #[async_trait]
        impl StorageBackend for Backend {
            async fn load(&self, key: &str) -> AnyResult<Option<Value>>;
            async fn store(&self, key: &str, value: Value) -> AnyResult<()>;
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl StorageBackend for HangingBackend {
        async fn load(&self, _key: &str) -> AnyResult<Option<Value>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn store(&self, _key: &str, _value: Value) -> AnyResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_timeout_fails_fast() {
        let config = Config::new("unused.json", Duration::from_millis(20), 1, 1);
        let store = OfferStore::new(Arc::new(HangingBackend), config);

        let err = store.add_offer(&raw_offer("Target", "10% off")).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout));
        assert!(err.should_retry());
    }

    #[tokio::test]
    async fn test_initialize_exhausts_bounded_retries() {
        let mut backend = MockBackend::new();
        backend
            .expect_load()
            .times(3)
            .returning(|_| Err(anyhow::anyhow!("storage offline")));

        let store = OfferStore::new(Arc::new(backend), fast_config());
        let err = store.initialize().await.unwrap_err();
        assert!(matches!(err, StoreError::InitFailed { attempts: 3 }));
        assert!(!err.should_retry());
    }

    #[tokio::test]
    async fn test_backend_errors_propagate_as_retryable() {
        let mut backend = MockBackend::new();
        backend
            .expect_load()
            .returning(|_| Err(anyhow::anyhow!("storage offline")));

        let store = OfferStore::new(Arc::new(backend), fast_config());
        let err = store
            .get_all_offers(&OfferQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(err.should_retry());
    }

    /// Fails the first database read, then recovers.
    struct FlakyBackend {
        inner: MemoryBackend,
        failed_once: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        async fn load(&self, key: &str) -> AnyResult<Option<Value>> {
            if !self
                .failed_once
                .swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                return Err(anyhow::anyhow!("transient read failure"));
            }
            self.inner.load(key).await
        }

        async fn store(&self, key: &str, value: Value) -> AnyResult<()> {
            self.inner.store(key, value).await
        }
    }

    #[tokio::test]
    async fn test_batch_isolates_per_item_failures() {
        let backend = FlakyBackend {
            inner: MemoryBackend::new(),
            failed_once: std::sync::atomic::AtomicBool::new(false),
        };

        let store = OfferStore::new(Arc::new(backend), fast_config());
        let results = store
            .add_offers(&[
                raw_offer("Lost", "1% off"),
                raw_offer("Saved", "2% off"),
            ])
            .await;

        // Item one hit the read failure; item two still landed
        assert!(results[0].is_err());
        assert!(results[1].is_ok());

        let offers = store.get_all_offers(&OfferQuery::default()).await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].merchant, "Saved");
    }
}

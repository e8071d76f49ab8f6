//! Filtering, searching and sorting over the stored offer list. This is the
//! contract the popup UI speaks: free-text search OR-ed across the display
//! fields, exact-match filters, and a sort key with direction.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::entities::{Offer, OfferSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    LastSeen,
    CreatedAt,
    UpdatedAt,
    ExpiryDate,
    Merchant,
    Discount,
    Category,
    SeenCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query accepted by `get_all_offers`. `Default` matches the popup's
/// initial view: everything, most recently seen first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferQuery {
    /// Case-insensitive substring match across merchant, discount,
    /// description and category (OR across fields).
    pub search: Option<String>,
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub source: Option<OfferSource>,
    pub is_active: Option<bool>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
}

impl Default for OfferQuery {
    fn default() -> Self {
        Self {
            search: None,
            merchant: None,
            category: None,
            source: None,
            is_active: None,
            sort_by: SortKey::LastSeen,
            sort_order: SortOrder::Desc,
            limit: None,
        }
    }
}

/// Apply a query to the full offer list: filter, sort, then limit.
pub fn apply(offers: &[Offer], query: &OfferQuery) -> Vec<Offer> {
    let mut results: Vec<Offer> = offers
        .iter()
        .filter(|offer| matches_filters(offer, query))
        .cloned()
        .collect();

    results.sort_by(|a, b| {
        let ordering = compare_by_key(a, b, query.sort_by);
        match query.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    if let Some(limit) = query.limit {
        results.truncate(limit);
    }

    results
}

fn matches_filters(offer: &Offer, query: &OfferQuery) -> bool {
    if let Some(search) = query.search.as_deref() {
        let search = search.trim();
        if !search.is_empty() && !matches_search(offer, search) {
            return false;
        }
    }
    if let Some(merchant) = query.merchant.as_deref() {
        if offer.merchant != merchant {
            return false;
        }
    }
    if let Some(category) = query.category.as_deref() {
        if offer.category != category {
            return false;
        }
    }
    if let Some(source) = query.source {
        if offer.source != source {
            return false;
        }
    }
    if let Some(is_active) = query.is_active {
        if offer.is_active != is_active {
            return false;
        }
    }
    true
}

fn matches_search(offer: &Offer, search: &str) -> bool {
    let needle = search.to_lowercase();
    [
        offer.merchant.as_str(),
        offer.discount.as_str(),
        offer.description.as_str(),
        offer.category.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

fn compare_by_key(a: &Offer, b: &Offer, key: SortKey) -> Ordering {
    match key {
        SortKey::LastSeen => a.last_seen.cmp(&b.last_seen),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        // None orders before Some, so never-updated offers sort first
        // ascending and last descending
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::ExpiryDate => a.parsed_expiry_date.cmp(&b.parsed_expiry_date),
        SortKey::Merchant => cmp_ci(&a.merchant, &b.merchant),
        SortKey::Discount => cmp_ci(&a.discount, &b.discount),
        SortKey::Category => cmp_ci(&a.category, &b.category),
        SortKey::SeenCount => a.seen_count.cmp(&b.seen_count),
    }
}

fn cmp_ci(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

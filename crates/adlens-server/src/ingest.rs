//! Dataset ingestion: resolve, normalize, and persist scraped records.
//!
//! Upserts run concurrently and unordered — each is keyed by the record's
//! own id and independently idempotent, so no cross-record coordination
//! is needed. A failed upsert is logged and skipped; the rest of the
//! batch proceeds.

use std::collections::HashMap;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use sqlx::PgPool;

use adlens_core::{brands::is_usable_page_name, Ad};
use adlens_db::BrandRow;
use adlens_scraper::{brand_match, normalize_record, NormalizeContext};

pub struct IngestOutcome {
    /// Ads that were successfully persisted, in dataset order.
    pub ads: Vec<Ad>,
    pub saved: usize,
    pub failed: usize,
}

/// Processes one run's dataset: associates each record with a brand,
/// normalizes it, upserts the batch with bounded concurrency, and
/// reconciles brand display names against the observed page names.
pub async fn process_dataset(
    pool: &PgPool,
    items: &[serde_json::Value],
    brands: &[BrandRow],
    concurrency: usize,
) -> IngestOutcome {
    let observed_at = Utc::now();
    let active: Vec<&BrandRow> = brands.iter().filter(|b| b.is_active).collect();
    let known_urls: Vec<String> = active.iter().map(|b| b.ad_library_url.clone()).collect();

    let mut ctx = NormalizeContext::new();
    let mut ads = Vec::with_capacity(items.len());
    // Page names observed per brand URL, in dataset order, for
    // reconciliation below.
    let mut observed_names: HashMap<String, Vec<String>> = HashMap::new();

    for item in items {
        let brand_url = brand_match::resolve_brand_url(item, &known_urls);
        let ad = normalize_record(item, &brand_url, observed_at, &mut ctx);

        // Only count names for URLs that actually belong to a tracked
        // brand — fallback matches must not rename anything.
        if known_urls.contains(&brand_url) && is_usable_page_name(&ad.page_name) {
            observed_names
                .entry(brand_url)
                .or_default()
                .push(ad.page_name.clone());
        }
        ads.push(ad);
    }

    let results: Vec<(Ad, bool)> = stream::iter(ads.into_iter().map(|ad| async move {
        let result = adlens_db::upsert_ad(pool, &ad, observed_at).await;
        if let Err(e) = &result {
            tracing::error!(ad_id = %ad.id, error = %e, "ad upsert failed");
        }
        (ad, result.is_ok())
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    let saved = results.iter().filter(|(_, ok)| *ok).count();
    let failed = results.len() - saved;

    // Unordered upserts; the response is re-sorted highest reach first,
    // matching the listing endpoint.
    let mut persisted: Vec<Ad> = results
        .into_iter()
        .filter_map(|(ad, ok)| ok.then_some(ad))
        .collect();
    persisted.sort_by(|a, b| b.reach.cmp(&a.reach));

    reconcile_brand_names(pool, &active, &observed_names).await;

    tracing::info!(
        records = items.len(),
        saved,
        failed,
        "dataset ingestion complete"
    );

    IngestOutcome {
        ads: persisted,
        saved,
        failed,
    }
}

/// Points each tracked brand's display name at the page name most often
/// observed for its URL. The scraped data is the source of truth: a
/// placeholder name derived from the URL at add time gets replaced as
/// soon as real records arrive.
async fn reconcile_brand_names(
    pool: &PgPool,
    brands: &[&BrandRow],
    observed_names: &HashMap<String, Vec<String>>,
) {
    for brand in brands {
        let Some(names) = observed_names.get(&brand.ad_library_url) else {
            continue;
        };
        let Some(most_common) = most_common_name(names) else {
            continue;
        };
        if most_common == brand.name {
            continue;
        }
        tracing::info!(
            brand_id = brand.id,
            from = %brand.name,
            to = %most_common,
            observations = names.len(),
            "updating brand name from scraped page names"
        );
        if let Err(e) = adlens_db::update_brand_name(pool, brand.id, &most_common).await {
            tracing::error!(brand_id = brand.id, error = %e, "brand name update failed");
        }
    }
}

/// Most frequent name; first-observed wins ties.
fn most_common_name(names: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut best: Option<(&str, usize)> = None;
    for name in names {
        let count = counts.entry(name.as_str()).or_insert(0);
        *count += 1;
        if best.is_none_or(|(_, best_count)| *count > best_count) {
            best = Some((name.as_str(), *count));
        }
    }
    best.map(|(name, _)| name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_common_name_picks_the_majority() {
        let names = vec![
            "Lumina Skin".to_owned(),
            "Lumina".to_owned(),
            "Lumina Skin".to_owned(),
        ];
        assert_eq!(most_common_name(&names).as_deref(), Some("Lumina Skin"));
    }

    #[test]
    fn most_common_name_first_observed_wins_ties() {
        let names = vec!["TechFlow".to_owned(), "Techflow ApS".to_owned()];
        assert_eq!(most_common_name(&names).as_deref(), Some("TechFlow"));
    }

    #[test]
    fn most_common_name_of_empty_is_none() {
        assert_eq!(most_common_name(&[]), None);
    }
}

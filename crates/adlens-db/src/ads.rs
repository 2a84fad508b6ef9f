//! Database operations for the `ads` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use adlens_core::Ad;

use crate::DbError;

const AD_COLUMNS: &str = "id, page_name, reach, video_url, thumbnail_url, heading, ad_copy, \
                          ad_library_url, brand_ad_library_url, first_seen, last_seen, \
                          start_date_formatted, ad_id, created_at";

/// A row from the `ads` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdRow {
    pub id: String,
    pub page_name: String,
    pub reach: i64,
    pub video_url: String,
    pub thumbnail_url: String,
    pub heading: String,
    pub ad_copy: String,
    pub ad_library_url: String,
    pub brand_ad_library_url: String,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: DateTime<Utc>,
    pub start_date_formatted: Option<String>,
    pub ad_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AdRow> for Ad {
    fn from(row: AdRow) -> Self {
        Ad {
            id: row.id,
            page_name: row.page_name,
            reach: row.reach,
            video_url: row.video_url,
            thumbnail_url: row.thumbnail_url,
            heading: row.heading,
            ad_copy: row.ad_copy,
            ad_library_url: row.ad_library_url,
            brand_ad_library_url: row.brand_ad_library_url,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            start_date_formatted: row.start_date_formatted,
            ad_id: row.ad_id,
        }
    }
}

/// Inserts or updates one canonical ad, keyed by `id`.
///
/// On conflict every observed field is refreshed, with two exceptions:
/// an existing `first_seen` is preserved (it is set once, ever), and a
/// previously-parsed `ad_id` survives a re-ingestion that could not parse
/// one. `last_seen` always advances to `observed_at`. The conflict-time
/// COALESCE makes concurrent upserts of the same id safe without a
/// read-before-write round trip.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_ad(pool: &PgPool, ad: &Ad, observed_at: DateTime<Utc>) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO ads (id, page_name, reach, video_url, thumbnail_url, heading, ad_copy, \
                          ad_library_url, brand_ad_library_url, first_seen, last_seen, \
                          start_date_formatted, ad_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, $11), $11, $12, $13) \
         ON CONFLICT (id) DO UPDATE SET \
             page_name            = EXCLUDED.page_name, \
             reach                = EXCLUDED.reach, \
             video_url            = EXCLUDED.video_url, \
             thumbnail_url        = EXCLUDED.thumbnail_url, \
             heading              = EXCLUDED.heading, \
             ad_copy              = EXCLUDED.ad_copy, \
             ad_library_url       = EXCLUDED.ad_library_url, \
             brand_ad_library_url = EXCLUDED.brand_ad_library_url, \
             first_seen           = COALESCE(ads.first_seen, EXCLUDED.first_seen), \
             last_seen            = EXCLUDED.last_seen, \
             start_date_formatted = EXCLUDED.start_date_formatted, \
             ad_id                = COALESCE(EXCLUDED.ad_id, ads.ad_id)",
    )
    .bind(&ad.id)
    .bind(&ad.page_name)
    .bind(ad.reach)
    .bind(&ad.video_url)
    .bind(&ad.thumbnail_url)
    .bind(&ad.heading)
    .bind(&ad.ad_copy)
    .bind(&ad.ad_library_url)
    .bind(&ad.brand_ad_library_url)
    .bind(ad.first_seen)
    .bind(observed_at)
    .bind(&ad.start_date_formatted)
    .bind(&ad.ad_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all ads belonging to the given brand URLs, highest reach first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ads_for_brand_urls(
    pool: &PgPool,
    brand_urls: &[String],
) -> Result<Vec<AdRow>, DbError> {
    let rows = sqlx::query_as::<_, AdRow>(&format!(
        "SELECT {AD_COLUMNS} FROM ads \
         WHERE brand_ad_library_url = ANY($1) \
         ORDER BY reach DESC, id"
    ))
    .bind(brand_urls)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The most recent `last_seen` across the given brand URLs — the
/// "data as of" watermark shown to callers.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_last_seen(
    pool: &PgPool,
    brand_urls: &[String],
) -> Result<Option<DateTime<Utc>>, DbError> {
    let row: (Option<DateTime<Utc>>,) = sqlx::query_as(
        "SELECT MAX(last_seen) FROM ads WHERE brand_ad_library_url = ANY($1)",
    )
    .bind(brand_urls)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Ads whose `ad_id` has not been parsed yet, for backfill.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ads_missing_ad_id(pool: &PgPool, limit: i64) -> Result<Vec<AdRow>, DbError> {
    let rows = sqlx::query_as::<_, AdRow>(&format!(
        "SELECT {AD_COLUMNS} FROM ads WHERE ad_id IS NULL LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Ads that carry an insights-namespace `ad_id`, oldest observation
/// first, for the scheduled insights refresh.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ads_with_ad_id(pool: &PgPool, limit: i64) -> Result<Vec<AdRow>, DbError> {
    let rows = sqlx::query_as::<_, AdRow>(&format!(
        "SELECT {AD_COLUMNS} FROM ads WHERE ad_id IS NOT NULL ORDER BY last_seen LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Writes a backfilled `ad_id` for one ad.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_ad_id(pool: &PgPool, id: &str, ad_id: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE ads SET ad_id = $1 WHERE id = $2")
        .bind(ad_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Compile-time smoke test: the row struct matches the canonical
    /// entity field for field.
    #[test]
    fn ad_row_converts_to_canonical_ad() {
        let now = Utc::now();
        let row = AdRow {
            id: "884422".to_owned(),
            page_name: "Lumina Skin".to_owned(),
            reach: 150_000,
            video_url: String::new(),
            thumbnail_url: "https://cdn.example.com/t.jpg".to_owned(),
            heading: "Heading".to_owned(),
            ad_copy: "Copy".to_owned(),
            ad_library_url: "https://example.com/?id=884422".to_owned(),
            brand_ad_library_url: "https://example.com/?view_all_page_id=1".to_owned(),
            first_seen: Some(now),
            last_seen: now,
            start_date_formatted: None,
            ad_id: Some("884422".to_owned()),
            created_at: now,
        };

        let ad: Ad = row.into();
        assert_eq!(ad.id, "884422");
        assert_eq!(ad.reach, 150_000);
        assert_eq!(ad.first_seen, Some(now));
        assert_eq!(ad.ad_id.as_deref(), Some("884422"));
    }
}

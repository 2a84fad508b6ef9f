//! Ads listing for a session, with per-ad derived metrics.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use adlens_core::Ad;
use adlens_insights::metrics::{days_active, viral_score};
use adlens_scraper::extract::parse_provider_date;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct AdsQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AdListItem {
    #[serde(flatten)]
    ad: Ad,
    days_active: i64,
    viral_score: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct AdsData {
    ads: Vec<AdListItem>,
    count: usize,
    last_updated: Option<DateTime<Utc>>,
}

/// The start date used for days-active: the provider's formatted start
/// date when it parses, otherwise the first observation.
fn start_date(ad: &Ad) -> Option<DateTime<Utc>> {
    ad.start_date_formatted
        .as_deref()
        .and_then(parse_provider_date)
        .or(ad.first_seen)
}

/// GET /api/v1/ads — ads for the session's active brands, highest reach
/// first, with days-active and viral-score derived per ad.
pub(super) async fn list_ads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AdsQuery>,
) -> Result<Json<ApiResponse<AdsData>>, ApiError> {
    let rid = &req_id.0;
    if query.session_id.trim().is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "session_id is required",
        ));
    }

    let brand_urls = adlens_db::list_active_brand_urls(&state.pool, &query.session_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    if brand_urls.is_empty() {
        return Ok(Json(ApiResponse {
            data: AdsData {
                ads: Vec::new(),
                count: 0,
                last_updated: None,
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let rows = adlens_db::list_ads_for_brand_urls(&state.pool, &brand_urls)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let last_updated = adlens_db::latest_last_seen(&state.pool, &brand_urls)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let now = Utc::now();
    let ads: Vec<AdListItem> = rows
        .into_iter()
        .map(|row| {
            let ad: Ad = row.into();
            let days = days_active(start_date(&ad), now);
            let score = viral_score(ad.reach, days);
            AdListItem {
                ad,
                days_active: days,
                viral_score: score,
            }
        })
        .collect();

    let count = ads.len();
    Ok(Json(ApiResponse {
        data: AdsData {
            ads,
            count,
            last_updated,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ad_with_dates(start_date_formatted: Option<&str>, first_seen: Option<DateTime<Utc>>) -> Ad {
        Ad {
            id: "1".to_owned(),
            page_name: "Lumina Skin".to_owned(),
            reach: 150_000,
            video_url: String::new(),
            thumbnail_url: "https://cdn.example.com/t.jpg".to_owned(),
            heading: String::new(),
            ad_copy: String::new(),
            ad_library_url: String::new(),
            brand_ad_library_url: String::new(),
            first_seen,
            last_seen: Utc::now(),
            start_date_formatted: start_date_formatted.map(ToOwned::to_owned),
            ad_id: None,
        }
    }

    #[test]
    fn start_date_prefers_formatted_over_first_seen() {
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ad = ad_with_dates(Some("2025-11-24 08:00:00"), Some(first));
        assert_eq!(
            start_date(&ad).unwrap().to_rfc3339(),
            "2025-11-24T08:00:00+00:00"
        );
    }

    #[test]
    fn unparsable_formatted_date_falls_back_to_first_seen() {
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ad = ad_with_dates(Some("soonish"), Some(first));
        assert_eq!(start_date(&ad), Some(first));
    }

    #[test]
    fn ad_list_item_flattens_canonical_fields() {
        let item = AdListItem {
            ad: ad_with_dates(None, None),
            days_active: 5,
            viral_score: 30_000,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["viral_score"], 30_000);
        assert_eq!(json["page_name"], "Lumina Skin");
    }
}

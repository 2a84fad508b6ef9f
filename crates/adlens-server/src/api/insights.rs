//! Insights endpoints: paginated batch sync and ad-id backfill.

use axum::{
    extract::State,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use adlens_insights::{collect_batch, SyncError, SyncParams};
use adlens_scraper::extract::ad_id_from_url;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SyncInsightsRequest {
    pub date_preset: Option<String>,
    pub account_offset: Option<usize>,
    pub accounts_per_batch: Option<usize>,
    pub max_ads_per_account: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncInsightsData {
    synced: usize,
    ads_listed: usize,
    date_preset: String,
    total_accounts: usize,
    account_offset: usize,
    has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<SyncError>,
}

/// POST /api/v1/sync-insights — fetch and persist one account batch of
/// performance insights. Callers page by resubmitting the returned
/// offset until `has_more` is false.
pub(super) async fn sync_insights(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SyncInsightsRequest>,
) -> Result<Json<ApiResponse<SyncInsightsData>>, ApiError> {
    let accounts = &state.config.insights_ad_accounts;
    let params = SyncParams::clamped(
        body.date_preset,
        body.account_offset,
        body.accounts_per_batch,
        body.max_ads_per_account,
    );

    if accounts.is_empty() || state.config.insights_api_token.is_none() {
        return Ok(Json(ApiResponse {
            data: SyncInsightsData {
                synced: 0,
                ads_listed: 0,
                date_preset: params.date_preset,
                total_accounts: accounts.len(),
                account_offset: 0,
                has_more: false,
                message: Some("no insights token/accounts configured".to_owned()),
                errors: Vec::new(),
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let outcome = collect_batch(&state.insights, accounts, &params, chrono::Utc::now()).await;

    let mut synced = 0;
    let mut errors = outcome.errors;
    for insight in &outcome.insights {
        match adlens_db::upsert_performance_insight(&state.pool, insight).await {
            Ok(()) => synced += 1,
            Err(e) => {
                tracing::error!(ad_id = %insight.ad_id, error = %e, "insight upsert failed");
                errors.push(SyncError {
                    account: insight.account_id.clone(),
                    ad_id: Some(insight.ad_id.clone()),
                    error: format!("upsert failed: {e}"),
                });
            }
        }
    }

    let message = if synced > 0 {
        Some(format!("synced {synced} ad(s)"))
    } else if let Some(first) = errors.first() {
        Some(first.error.clone())
    } else if outcome.ads_listed == 0 {
        Some("insights API returned 0 ads — check account ids and token permissions".to_owned())
    } else {
        None
    };

    Ok(Json(ApiResponse {
        data: SyncInsightsData {
            synced,
            ads_listed: outcome.ads_listed,
            date_preset: params.date_preset,
            total_accounts: accounts.len(),
            account_offset: outcome.next_offset,
            has_more: outcome.has_more,
            message,
            errors,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct BackfillData {
    updated: usize,
}

/// POST /api/v1/insights/backfill-ad-ids — parse the insights-namespace
/// id out of stored library URLs for ads that don't carry one yet.
pub(super) async fn backfill_ad_ids(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<BackfillData>>, ApiError> {
    let rid = &req_id.0;

    let rows = adlens_db::list_ads_missing_ad_id(&state.pool, 1000)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let mut updated = 0;
    for row in rows {
        let Some(ad_id) = ad_id_from_url(&row.ad_library_url)
            .or_else(|| ad_id_from_url(&row.brand_ad_library_url))
        else {
            continue;
        };
        match adlens_db::set_ad_id(&state.pool, &row.id, &ad_id).await {
            Ok(()) => updated += 1,
            Err(e) => tracing::error!(id = %row.id, error = %e, "ad_id backfill failed"),
        }
    }

    Ok(Json(ApiResponse {
        data: BackfillData { updated },
        meta: ResponseMeta::new(req_id.0),
    }))
}

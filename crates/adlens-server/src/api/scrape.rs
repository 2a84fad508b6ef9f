//! Scrape-run endpoints: trigger a provider run and poll it to
//! completion.
//!
//! The status endpoint is the server half of the orchestration: while the
//! provider reports the run in flight it answers `RUNNING`; on success it
//! fetches the dataset, normalizes and persists every record, and returns
//! the normalized ads; on failure it passes the provider's message
//! through verbatim.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use adlens_core::Ad;
use adlens_scraper::ScrapeError;

use crate::ingest;
use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct TriggerScrapeRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct TriggerScrapeData {
    run_id: String,
    targets: usize,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeStatusQuery {
    pub run_id: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ScrapeStatusData {
    status: &'static str,
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ads: Option<Vec<Ad>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn map_scrape_error(request_id: &str, error: &ScrapeError) -> ApiError {
    match error {
        ScrapeError::NoActiveTargets => ApiError::new(
            request_id,
            "no_active_targets",
            "no active brands for this session — add at least one before triggering a scrape",
        ),
        ScrapeError::MissingToken => ApiError::new(
            request_id,
            "internal_error",
            "scrape provider token is not configured",
        ),
        other => {
            tracing::error!(error = %other, "scrape provider call failed");
            ApiError::new(request_id, "bad_gateway", other.to_string())
        }
    }
}

/// POST /api/v1/scrape — trigger a scrape run for a session's active
/// brands.
pub(super) async fn trigger_scrape(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<TriggerScrapeRequest>,
) -> Result<Json<ApiResponse<TriggerScrapeData>>, ApiError> {
    let rid = &req_id.0;
    if body.session_id.trim().is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "session_id is required",
        ));
    }

    let targets = adlens_db::list_active_brand_urls(&state.pool, &body.session_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if targets.is_empty() {
        return Err(map_scrape_error(rid, &ScrapeError::NoActiveTargets));
    }

    let run = state
        .scrape
        .trigger_run(&targets)
        .await
        .map_err(|e| map_scrape_error(rid, &e))?;

    let row = adlens_db::create_scrape_run(&state.pool, &run.id, &body.session_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    adlens_db::start_scrape_run(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: TriggerScrapeData {
            run_id: run.id,
            targets: targets.len(),
            message: format!("scraping started for {} brand(s)", targets.len()),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/scrape-status — poll a run; on success, ingest its
/// dataset and return the normalized ads.
pub(super) async fn scrape_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ScrapeStatusQuery>,
) -> Result<Json<ApiResponse<ScrapeStatusData>>, ApiError> {
    let rid = &req_id.0;

    let run = state
        .scrape
        .get_run(&query.run_id)
        .await
        .map_err(|e| map_scrape_error(rid, &e))?;

    if run.is_failed() {
        let message = run
            .status_message
            .clone()
            .unwrap_or_else(|| "run failed".to_owned());
        record_failure(&state, &query, &message).await;
        return Ok(Json(ApiResponse {
            data: ScrapeStatusData {
                status: "FAILED",
                run_id: run.id,
                ads: None,
                count: None,
                message: Some(message),
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    if !run.is_succeeded() {
        return Ok(Json(ApiResponse {
            data: ScrapeStatusData {
                status: "RUNNING",
                run_id: run.id,
                ads: None,
                count: None,
                message: None,
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let dataset_id = run.default_dataset_id.clone().ok_or_else(|| {
        ApiError::new(
            rid,
            "bad_gateway",
            format!("could not determine dataset for run {}", run.id),
        )
    })?;

    let items = state
        .scrape
        .dataset_items(&dataset_id)
        .await
        .map_err(|e| map_scrape_error(rid, &e))?;

    let brands = adlens_db::list_brands(&state.pool, &query.session_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let outcome = ingest::process_dataset(
        &state.pool,
        &items,
        &brands,
        state.config.ingest_concurrency,
    )
    .await;

    record_success(&state, &query, &dataset_id, outcome.saved).await;

    let count = outcome.ads.len();
    Ok(Json(ApiResponse {
        data: ScrapeStatusData {
            status: "COMPLETED",
            run_id: run.id,
            ads: Some(outcome.ads),
            count: Some(count),
            message: None,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Terminal transitions are recorded best-effort: a repeated poll of a
/// run that already terminated is expected, not an error.
async fn record_failure(state: &AppState, query: &ScrapeStatusQuery, message: &str) {
    match adlens_db::get_scrape_run_by_provider_id(&state.pool, &query.session_id, &query.run_id)
        .await
    {
        Ok(row) => {
            if let Err(e) = adlens_db::fail_scrape_run(&state.pool, row.id, message).await {
                if !matches!(e, adlens_db::DbError::InvalidScrapeRunTransition { .. }) {
                    tracing::error!(error = %e, run_id = %query.run_id, "failed to record run failure");
                }
            }
        }
        Err(adlens_db::DbError::NotFound) => {
            tracing::warn!(run_id = %query.run_id, "no scrape_runs row for failed provider run");
        }
        Err(e) => tracing::error!(error = %e, run_id = %query.run_id, "scrape run lookup failed"),
    }
}

async fn record_success(
    state: &AppState,
    query: &ScrapeStatusQuery,
    dataset_id: &str,
    records: usize,
) {
    match adlens_db::get_scrape_run_by_provider_id(&state.pool, &query.session_id, &query.run_id)
        .await
    {
        Ok(row) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            if let Err(e) =
                adlens_db::complete_scrape_run(&state.pool, row.id, dataset_id, records as i32)
                    .await
            {
                if !matches!(e, adlens_db::DbError::InvalidScrapeRunTransition { .. }) {
                    tracing::error!(error = %e, run_id = %query.run_id, "failed to record run success");
                }
            }
        }
        Err(adlens_db::DbError::NotFound) => {
            tracing::warn!(run_id = %query.run_id, "no scrape_runs row for succeeded provider run");
        }
        Err(e) => tracing::error!(error = %e, run_id = %query.run_id, "scrape run lookup failed"),
    }
}

//! Brand registry endpoints: add (name derived from the URL), list, and
//! soft delete. Brands are the scrape targets; deleting one only clears
//! its `is_active` flag so existing ads keep their association.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use adlens_core::Brand;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CreateBrandRequest {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteBrandRequest {
    pub session_id: String,
    pub brand_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct BrandsQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct BrandsData {
    brands: Vec<Brand>,
    count: usize,
}

fn require_session_id(request_id: &str, session_id: &str) -> Result<(), ApiError> {
    if session_id.trim().is_empty() {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            "session_id is required",
        ));
    }
    Ok(())
}

/// POST /api/v1/brands — track a new brand by its ad-library URL.
pub(super) async fn create_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateBrandRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Brand>>), ApiError> {
    let rid = &req_id.0;
    require_session_id(rid, &body.session_id)?;

    let url = body.url.trim();
    if reqwest::Url::parse(url).is_err() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("'{url}' is not a valid URL"),
        ));
    }

    let name = adlens_core::brands::name_from_url(url);
    let row = adlens_db::insert_brand(&state.pool, &body.session_id, &name, url)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: row.into(),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/brands — all brands for a session, inactive included.
pub(super) async fn list_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<BrandsQuery>,
) -> Result<Json<ApiResponse<BrandsData>>, ApiError> {
    let rid = &req_id.0;
    require_session_id(rid, &query.session_id)?;

    let rows = adlens_db::list_brands(&state.pool, &query.session_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let brands: Vec<Brand> = rows.into_iter().map(Into::into).collect();
    let count = brands.len();
    Ok(Json(ApiResponse {
        data: BrandsData { brands, count },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// DELETE /api/v1/brands — soft-delete a brand, scoped to its session.
pub(super) async fn delete_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<DeleteBrandRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    require_session_id(rid, &body.session_id)?;

    // Ownership check before the update so an unknown id and a foreign
    // id both answer 404 rather than silently succeeding.
    adlens_db::get_brand(&state.pool, &body.session_id, body.brand_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    adlens_db::deactivate_brand(&state.pool, &body.session_id, body.brand_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({ "deleted": true }),
        meta: ResponseMeta::new(req_id.0),
    }))
}

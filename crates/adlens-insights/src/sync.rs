//! Batched insights collection across ad accounts.
//!
//! Accounts are processed in configured order, a bounded slice per call;
//! the caller drives subsequent pages by resubmitting with the returned
//! offset until `has_more` is false. One ad's failed fetch lands in the
//! error list and never aborts the batch — sibling ads still come back
//! for persistence.

use chrono::{DateTime, Utc};
use serde::Serialize;

use adlens_core::PerformanceInsight;

use crate::client::InsightsClient;
use crate::metrics::aggregate_insight;

/// Batch parameters, clamped to keep per-call external-API load bounded.
#[derive(Debug, Clone)]
pub struct SyncParams {
    pub date_preset: String,
    pub account_offset: usize,
    pub accounts_per_batch: usize,
    pub max_ads_per_account: usize,
}

impl SyncParams {
    /// Applies the documented clamps: 1–10 accounts per batch, 1–500 ads
    /// per account, non-negative offset.
    #[must_use]
    pub fn clamped(
        date_preset: Option<String>,
        account_offset: Option<usize>,
        accounts_per_batch: Option<usize>,
        max_ads_per_account: Option<usize>,
    ) -> Self {
        Self {
            date_preset: date_preset.unwrap_or_else(|| "last_30d".to_owned()),
            account_offset: account_offset.unwrap_or(0),
            accounts_per_batch: accounts_per_batch.unwrap_or(1).clamp(1, 10),
            max_ads_per_account: max_ads_per_account.unwrap_or(100).clamp(1, 500),
        }
    }
}

/// One recorded failure: account-level (listing failed) or ad-level
/// (insights fetch failed, or no data came back).
#[derive(Debug, Clone, Serialize)]
pub struct SyncError {
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<String>,
    pub error: String,
}

/// Outcome of one batch: the snapshots to persist, the errors, and the
/// cursor for the next call.
#[derive(Debug)]
pub struct SyncOutcome {
    pub insights: Vec<PerformanceInsight>,
    pub errors: Vec<SyncError>,
    pub ads_listed: usize,
    pub next_offset: usize,
    pub has_more: bool,
}

/// Collects insight snapshots for one slice of `accounts`.
///
/// Never fails as a whole: every account and ad failure is isolated into
/// [`SyncOutcome::errors`].
pub async fn collect_batch(
    client: &InsightsClient,
    accounts: &[String],
    params: &SyncParams,
    fetched_at: DateTime<Utc>,
) -> SyncOutcome {
    let start = params.account_offset.min(accounts.len());
    let end = (start + params.accounts_per_batch).min(accounts.len());
    let slice = &accounts[start..end];

    let mut insights = Vec::new();
    let mut errors = Vec::new();
    let mut ads_listed = 0;

    for account_id in slice {
        let ads = match client.list_ads(account_id, params.max_ads_per_account).await {
            Ok(ads) => ads,
            Err(err) => {
                tracing::warn!(account = %account_id, error = %err, "ad listing failed");
                errors.push(SyncError {
                    account: account_id.clone(),
                    ad_id: None,
                    error: err.to_string(),
                });
                continue;
            }
        };
        ads_listed += ads.len();

        for ad in &ads {
            match client.get_insights(&ad.id, &params.date_preset).await {
                Ok(rows) if rows.is_empty() => {
                    errors.push(SyncError {
                        account: account_id.clone(),
                        ad_id: Some(ad.id.clone()),
                        error: "no insights data".to_owned(),
                    });
                }
                Ok(rows) => {
                    insights.push(aggregate_insight(
                        ad,
                        account_id,
                        &rows,
                        &params.date_preset,
                        fetched_at,
                    ));
                }
                Err(err) => {
                    tracing::warn!(account = %account_id, ad_id = %ad.id, error = %err, "insights fetch failed");
                    errors.push(SyncError {
                        account: account_id.clone(),
                        ad_id: Some(ad.id.clone()),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    let next_offset = end;
    SyncOutcome {
        insights,
        errors,
        ads_listed,
        next_offset,
        has_more: next_offset < accounts.len(),
    }
}

//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring insights refresh when the insights API is configured.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use adlens_insights::metrics::aggregate_insight;
use adlens_insights::{AdRef, InsightsClient};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<adlens_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if config.insights_api_token.is_some() {
        register_insights_refresh_job(&scheduler, pool, Arc::clone(&config)).await?;
    } else {
        tracing::info!("insights token not configured; refresh job not registered");
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Registers the recurring insights refresh.
///
/// Re-fetches performance insights for a bounded batch of ads that
/// already carry an insights-namespace `ad_id`, oldest observations
/// first. Failures are logged and never fatal.
async fn register_insights_refresh_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<adlens_core::AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let cron = config.insights_refresh_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting insights refresh");
            run_insights_refresh(&pool, &config).await;
            tracing::info!("scheduler: insights refresh complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Drives one refresh pass over ads with a known `ad_id`.
async fn run_insights_refresh(pool: &PgPool, config: &adlens_core::AppConfig) {
    let client = match InsightsClient::from_app_config(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: insights client construction failed");
            return;
        }
    };

    #[allow(clippy::cast_possible_wrap)]
    let batch = config.insights_refresh_batch as i64;
    let rows = match adlens_db::list_ads_with_ad_id(pool, batch).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list ads for refresh");
            return;
        }
    };
    if rows.is_empty() {
        tracing::info!("scheduler: no ads with ad_id; skipping refresh");
        return;
    }

    let fetched_at = chrono::Utc::now();
    let mut refreshed = 0usize;
    for row in rows {
        let Some(ad_id) = row.ad_id else { continue };

        let rows = match client.get_insights(&ad_id, "last_7d").await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(ad_id = %ad_id, error = %e, "scheduler: insights fetch failed");
                continue;
            }
        };
        if rows.is_empty() {
            continue;
        }

        // Preserve the account id recorded by the last full sync; the
        // per-ad endpoint does not return it.
        let account_id = adlens_db::get_performance_insight(pool, &ad_id)
            .await
            .ok()
            .flatten()
            .map_or_else(|| "unknown".to_owned(), |existing| existing.account_id);

        let ad_ref = AdRef {
            id: ad_id.clone(),
            name: None,
            account_id: None,
        };
        let insight = aggregate_insight(&ad_ref, &account_id, &rows, "last_7d", fetched_at);

        match adlens_db::upsert_performance_insight(pool, &insight).await {
            Ok(()) => refreshed += 1,
            Err(e) => tracing::error!(ad_id = %ad_id, error = %e, "scheduler: insight upsert failed"),
        }
    }

    tracing::info!(refreshed, "scheduler: insights refresh pass finished");
}

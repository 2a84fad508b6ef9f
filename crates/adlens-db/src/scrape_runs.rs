//! Database operations for the `scrape_runs` table.
//!
//! Status transitions are monotonic and enforced with conditional
//! UPDATEs: a transition whose precondition status no longer holds
//! affects zero rows and surfaces as
//! [`DbError::InvalidScrapeRunTransition`]. A run terminates exactly
//! once.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use adlens_core::ScrapeRunStatus;

use crate::DbError;

const RUN_COLUMNS: &str = "id, public_id, provider_run_id, session_id, status, dataset_id, \
                           records_processed, error_message, created_at, started_at, completed_at";

/// A row from the `scrape_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub provider_run_id: String,
    pub session_id: String,
    pub status: String,
    /// Set only when the run succeeded.
    pub dataset_id: Option<String>,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Creates a new run in `pending` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scrape_run(
    pool: &PgPool,
    provider_run_id: &str,
    session_id: &str,
) -> Result<ScrapeRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "INSERT INTO scrape_runs (public_id, provider_run_id, session_id, status) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(provider_run_id)
    .bind(session_id)
    .bind(ScrapeRunStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `pending`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_scrape_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = $1, started_at = NOW() \
         WHERE id = $2 AND status = $3",
    )
    .bind(ScrapeRunStatus::Running.as_str())
    .bind(id)
    .bind(ScrapeRunStatus::Pending.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: ScrapeRunStatus::Pending.as_str(),
        });
    }
    Ok(())
}

/// Marks a run as `succeeded`, recording the dataset it produced and how
/// many records were ingested.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_scrape_run(
    pool: &PgPool,
    id: i64,
    dataset_id: &str,
    records_processed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = $1, completed_at = NOW(), dataset_id = $2, records_processed = $3 \
         WHERE id = $4 AND status = $5",
    )
    .bind(ScrapeRunStatus::Succeeded.as_str())
    .bind(dataset_id)
    .bind(records_processed)
    .bind(id)
    .bind(ScrapeRunStatus::Running.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: ScrapeRunStatus::Running.as_str(),
        });
    }
    Ok(())
}

/// Marks a run as `failed` with the provider's message, verbatim.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_scrape_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = $1, completed_at = NOW(), error_message = $2 \
         WHERE id = $3 AND status = $4",
    )
    .bind(ScrapeRunStatus::Failed.as_str())
    .bind(error_message)
    .bind(id)
    .bind(ScrapeRunStatus::Running.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: ScrapeRunStatus::Running.as_str(),
        });
    }
    Ok(())
}

/// Fetches a run by provider run id, scoped to its session.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no matching run exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scrape_run_by_provider_id(
    pool: &PgPool,
    session_id: &str,
    provider_run_id: &str,
) -> Result<ScrapeRunRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM scrape_runs \
         WHERE provider_run_id = $1 AND session_id = $2 \
         ORDER BY created_at DESC \
         LIMIT 1"
    ))
    .bind(provider_run_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn scrape_run_row_has_expected_fields() {
        let row = ScrapeRunRow {
            id: 1,
            public_id: Uuid::new_v4(),
            provider_run_id: "run-abc".to_owned(),
            session_id: "s-1".to_owned(),
            status: "pending".to_owned(),
            dataset_id: None,
            records_processed: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        assert_eq!(row.status, "pending");
        assert!(row.dataset_id.is_none());
        assert!(row.completed_at.is_none());
    }
}

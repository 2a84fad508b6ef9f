//! Database operations for the `brands` table.
//!
//! Brands are session-scoped and soft-deleted only: `is_active = false`
//! removes a brand from scrape targeting but keeps its row (and the ads
//! already associated with its URL).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const BRAND_COLUMNS: &str = "id, session_id, name, ad_library_url, is_active, created_at";

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub ad_library_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<BrandRow> for adlens_core::Brand {
    fn from(row: BrandRow) -> Self {
        adlens_core::Brand {
            id: row.id,
            session_id: row.session_id,
            name: row.name,
            ad_library_url: row.ad_library_url,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Inserts a new active brand for a session and returns the created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_brand(
    pool: &PgPool,
    session_id: &str,
    name: &str,
    ad_library_url: &str,
) -> Result<BrandRow, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "INSERT INTO brands (session_id, name, ad_library_url, is_active) \
         VALUES ($1, $2, $3, TRUE) \
         RETURNING {BRAND_COLUMNS}"
    ))
    .bind(session_id)
    .bind(name)
    .bind(ad_library_url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns all brands for a session, newest first, inactive ones included.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_brands(pool: &PgPool, session_id: &str) -> Result<Vec<BrandRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands WHERE session_id = $1 ORDER BY id DESC"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the ad-library URLs of a session's active brands — the scrape
/// targets and the resolver's known-URL set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_brand_urls(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<String>, DbError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT ad_library_url FROM brands \
         WHERE session_id = $1 AND is_active = TRUE \
         ORDER BY id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(url,)| url).collect())
}

/// Fetches one brand scoped to its session.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the brand does not exist or belongs
/// to a different session, or [`DbError::Sqlx`] if the query fails.
pub async fn get_brand(pool: &PgPool, session_id: &str, brand_id: i64) -> Result<BrandRow, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands WHERE id = $1 AND session_id = $2"
    ))
    .bind(brand_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Soft-deletes a brand (sets `is_active = FALSE`), session-scoped.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such brand exists for the session,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_brand(
    pool: &PgPool,
    session_id: &str,
    brand_id: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE brands SET is_active = FALSE WHERE id = $1 AND session_id = $2",
    )
    .bind(brand_id)
    .bind(session_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Updates a brand's display name (reconciled from observed page names).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_brand_name(pool: &PgPool, brand_id: i64, name: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE brands SET name = $1 WHERE id = $2")
        .bind(name)
        .bind(brand_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn brand_row_has_expected_fields() {
        let row = BrandRow {
            id: 1,
            session_id: "s-1".to_owned(),
            name: "Lumina Skin".to_owned(),
            ad_library_url: "https://example.com/?view_all_page_id=1".to_owned(),
            is_active: true,
            created_at: Utc::now(),
        };
        assert!(row.is_active);
        assert_eq!(row.session_id, "s-1");
    }
}

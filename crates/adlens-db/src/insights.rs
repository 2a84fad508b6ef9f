//! Database operations for the `performance_insights` table.
//!
//! One row per insights-namespace `ad_id`. The table keeps no history:
//! every successful fetch overwrites the previous snapshot (last fetch
//! wins).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use adlens_core::PerformanceInsight;

use crate::DbError;

const INSIGHT_COLUMNS: &str = "ad_id, account_id, name, spend, impressions, clicks, purchases, \
                               purchase_value, roas, ctr, cpc, cpm, currency, date_preset, fetched_at";

/// A row from the `performance_insights` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PerformanceInsightRow {
    pub ad_id: String,
    pub account_id: String,
    pub name: Option<String>,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub roas: Option<f64>,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub currency: Option<String>,
    pub date_preset: String,
    pub fetched_at: DateTime<Utc>,
}

impl From<PerformanceInsightRow> for PerformanceInsight {
    fn from(row: PerformanceInsightRow) -> Self {
        PerformanceInsight {
            ad_id: row.ad_id,
            account_id: row.account_id,
            name: row.name,
            spend: row.spend,
            impressions: row.impressions,
            clicks: row.clicks,
            purchases: row.purchases,
            purchase_value: row.purchase_value,
            roas: row.roas,
            ctr: row.ctr,
            cpc: row.cpc,
            cpm: row.cpm,
            currency: row.currency,
            date_preset: row.date_preset,
            fetched_at: row.fetched_at,
        }
    }
}

/// Inserts or overwrites the snapshot for one ad id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_performance_insight(
    pool: &PgPool,
    insight: &PerformanceInsight,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO performance_insights \
             (ad_id, account_id, name, spend, impressions, clicks, purchases, purchase_value, \
              roas, ctr, cpc, cpm, currency, date_preset, fetched_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (ad_id) DO UPDATE SET \
             account_id     = EXCLUDED.account_id, \
             name           = EXCLUDED.name, \
             spend          = EXCLUDED.spend, \
             impressions    = EXCLUDED.impressions, \
             clicks         = EXCLUDED.clicks, \
             purchases      = EXCLUDED.purchases, \
             purchase_value = EXCLUDED.purchase_value, \
             roas           = EXCLUDED.roas, \
             ctr            = EXCLUDED.ctr, \
             cpc            = EXCLUDED.cpc, \
             cpm            = EXCLUDED.cpm, \
             currency       = EXCLUDED.currency, \
             date_preset    = EXCLUDED.date_preset, \
             fetched_at     = EXCLUDED.fetched_at",
    )
    .bind(&insight.ad_id)
    .bind(&insight.account_id)
    .bind(&insight.name)
    .bind(insight.spend)
    .bind(insight.impressions)
    .bind(insight.clicks)
    .bind(insight.purchases)
    .bind(insight.purchase_value)
    .bind(insight.roas)
    .bind(insight.ctr)
    .bind(insight.cpc)
    .bind(insight.cpm)
    .bind(&insight.currency)
    .bind(&insight.date_preset)
    .bind(insight.fetched_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches the current snapshot for one ad id, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_performance_insight(
    pool: &PgPool,
    ad_id: &str,
) -> Result<Option<PerformanceInsightRow>, DbError> {
    let row = sqlx::query_as::<_, PerformanceInsightRow>(&format!(
        "SELECT {INSIGHT_COLUMNS} FROM performance_insights WHERE ad_id = $1"
    ))
    .bind(ad_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn insight_row_converts_to_canonical_type() {
        let row = PerformanceInsightRow {
            ad_id: "120210".to_owned(),
            account_id: "act_1".to_owned(),
            name: None,
            spend: 100.0,
            impressions: 5000,
            clicks: 150,
            purchases: 10.0,
            purchase_value: 250.0,
            roas: Some(2.5),
            ctr: 3.0,
            cpc: 0.666,
            cpm: 20.0,
            currency: Some("DKK".to_owned()),
            date_preset: "last_30d".to_owned(),
            fetched_at: Utc::now(),
        };
        let insight: PerformanceInsight = row.into();
        assert_eq!(insight.roas, Some(2.5));
        assert_eq!(insight.impressions, 5000);
    }
}

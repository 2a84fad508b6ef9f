use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical, normalized representation of one observed ad.
///
/// Produced by the scraper's normalizer from an untyped provider record
/// and persisted keyed by `id`. Wire names are snake_case and mirror the
/// database columns exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    /// Stable identifier: provider-assigned archive id where available,
    /// otherwise derived deterministically from the record itself.
    pub id: String,
    pub page_name: String,
    /// Non-negative; 0 when the provider reported nothing usable.
    pub reach: i64,
    pub video_url: String,
    /// Never empty — the normalizer substitutes a placeholder asset when
    /// no image candidate exists anywhere in the raw record.
    pub thumbnail_url: String,
    pub heading: String,
    pub ad_copy: String,
    pub ad_library_url: String,
    pub brand_ad_library_url: String,
    /// Set on first ingestion and preserved verbatim on every
    /// re-ingestion of the same `id`.
    pub first_seen: Option<DateTime<Utc>>,
    /// Advanced on every observation; always >= `first_seen`.
    pub last_seen: DateTime<Utc>,
    /// The provider's own start-date string, kept raw for display and
    /// for days-active derivation.
    pub start_date_formatted: Option<String>,
    /// Numeric id parsed out of an ad-library URL's `id=` parameter;
    /// keys the ad into the insights API namespace.
    pub ad_id: Option<String>,
}

/// A tracked brand, scoped to a client session.
///
/// Brands are never hard-deleted; `is_active = false` is the soft-delete
/// flag and excludes the brand from scrape targeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub ad_library_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of one external scrape run.
///
/// Transitions are monotonic: `Pending → Running → {Succeeded | Failed}`.
/// A run terminates exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeRunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ScrapeRunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeRunStatus::Pending => "pending",
            ScrapeRunStatus::Running => "running",
            ScrapeRunStatus::Succeeded => "succeeded",
            ScrapeRunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ScrapeRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A performance-metrics snapshot for one ad, fetched from the insights
/// API and keyed by that API's own ad identifier.
///
/// One logical row per `ad_id`; a re-fetch overwrites the previous
/// snapshot (last fetch wins, no history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInsight {
    pub ad_id: String,
    pub account_id: String,
    pub name: Option<String>,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub purchases: f64,
    pub purchase_value: f64,
    /// `None` when spend is zero — the ratio is undefined, not zero.
    pub roas: Option<f64>,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub currency: Option<String>,
    pub date_preset: String,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn scrape_run_status_round_trips_as_lowercase() {
        assert_eq!(ScrapeRunStatus::Running.as_str(), "running");
        let json = serde_json::to_string(&ScrapeRunStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
        let back: ScrapeRunStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, ScrapeRunStatus::Failed);
    }

    #[test]
    fn ad_serializes_with_snake_case_wire_names() {
        let ad = Ad {
            id: "123".to_owned(),
            page_name: "Lumina Skin".to_owned(),
            reach: 150_000,
            video_url: String::new(),
            thumbnail_url: "https://example.com/t.jpg".to_owned(),
            heading: "Get Glowing Skin".to_owned(),
            ad_copy: "Stop masking your skin problems.".to_owned(),
            ad_library_url: "https://example.com/ads/library/?id=123".to_owned(),
            brand_ad_library_url: "https://example.com/ads/library/?view_all_page_id=9".to_owned(),
            first_seen: None,
            last_seen: Utc::now(),
            start_date_formatted: Some("2025-11-24".to_owned()),
            ad_id: Some("123".to_owned()),
        };
        let json = serde_json::to_value(&ad).unwrap();
        assert!(json.get("thumbnail_url").is_some());
        assert!(json.get("brand_ad_library_url").is_some());
        assert!(json.get("start_date_formatted").is_some());
    }
}

//! Pure metric computations over insights rows.
//!
//! Nothing here touches the network or the database; everything is
//! deterministic over its inputs, which is what makes the dedup and
//! division-guard rules testable in isolation.

use chrono::{DateTime, Utc};
use serde_json::Value;

use adlens_core::PerformanceInsight;

use crate::types::{ActionEntry, AdRef, InsightRow};

/// The API reports one real-world conversion under several overlapping
/// action types. Summing across them overcounts 2–3×; exactly one label
/// is taken, in this priority order.
pub const PURCHASE_ACTION_PRIORITY: [&str; 3] = [
    "omni_purchase",
    "offsite_conversion.fb_pixel_purchase",
    "purchase",
];

/// Coerces a JSON value to a finite f64: numbers directly, numeric
/// strings parsed. Everything else is `None`.
fn finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn entry_value(entry: &ActionEntry) -> Option<f64> {
    entry.value.as_ref().and_then(finite_number)
}

/// Resolves the purchase metric from an action list by selecting exactly
/// one canonical label per [`PURCHASE_ACTION_PRIORITY`] — never summing
/// across labels.
#[must_use]
pub fn single_purchase_metric(entries: Option<&[ActionEntry]>) -> f64 {
    let Some(entries) = entries else { return 0.0 };
    for canonical in PURCHASE_ACTION_PRIORITY {
        let found = entries.iter().find(|entry| {
            entry
                .action_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(canonical))
        });
        if let Some(entry) = found {
            return entry_value(entry).unwrap_or(0.0);
        }
    }
    0.0
}

/// Resolves the click count for a row.
///
/// Order: explicit `outbound_clicks` (number, numeric string, or
/// `[{value}]` array) → an outbound/link/inline-link action entry →
/// `inline_link_clicks` → generic `clicks`. First finite value wins;
/// absence of all yields 0.
#[must_use]
pub fn click_count(row: &InsightRow) -> f64 {
    if let Some(ob) = &row.outbound_clicks {
        if let Some(n) = finite_number(ob) {
            return n;
        }
        if let Some(first) = ob.as_array().and_then(|a| a.first()) {
            let candidate = first.get("value").unwrap_or(first);
            if let Some(n) = finite_number(candidate) {
                return n;
            }
        }
    }

    let link_entry = row.actions.as_deref().and_then(|entries| {
        entries.iter().find(|entry| {
            entry.action_type.as_deref().is_some_and(|t| {
                let t = t.to_ascii_lowercase();
                matches!(t.as_str(), "outbound_click" | "link_click" | "inline_link_click")
            })
        })
    });
    if let Some(entry) = link_entry {
        if let Some(n) = entry_value(entry) {
            return n;
        }
    }

    if let Some(n) = row.inline_link_clicks.as_ref().and_then(finite_number) {
        return n;
    }
    if let Some(n) = row.clicks.as_ref().and_then(finite_number) {
        return n;
    }
    0.0
}

/// Derived efficiency ratios with division guards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRatios {
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    /// `None` when spend is zero: the ratio is undefined, not zero.
    pub roas: Option<f64>,
}

#[must_use]
pub fn derived_ratios(spend: f64, impressions: f64, clicks: f64, purchase_value: f64) -> DerivedRatios {
    DerivedRatios {
        ctr: if impressions > 0.0 {
            clicks / impressions * 100.0
        } else {
            0.0
        },
        cpc: if clicks > 0.0 { spend / clicks } else { 0.0 },
        cpm: if impressions > 0.0 {
            spend / impressions * 1000.0
        } else {
            0.0
        },
        roas: if spend > 0.0 {
            Some(purchase_value / spend)
        } else {
            None
        },
    }
}

/// Whole days since `start`, floored, never below 1. Absent or future
/// start dates count as 1 so per-day ratios stay defined.
#[must_use]
pub fn days_active(start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    start.map_or(1, |s| (now - s).num_days().max(1))
}

/// Reach per active day, rounded — the "spread per day" proxy.
#[must_use]
pub fn viral_score(reach: i64, days_active: i64) -> i64 {
    let days = days_active.max(1);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let score = (reach as f64 / days as f64).round() as i64;
    score
}

/// Folds an ad's insight rows into one [`PerformanceInsight`] snapshot.
///
/// Totals are summed across rows, with the per-row purchase dedup and
/// click resolution applied before summing; ratios are derived once over
/// the totals.
#[must_use]
pub fn aggregate_insight(
    ad: &AdRef,
    fallback_account_id: &str,
    rows: &[InsightRow],
    date_preset: &str,
    fetched_at: DateTime<Utc>,
) -> PerformanceInsight {
    let mut spend = 0.0;
    let mut impressions = 0.0;
    let mut clicks = 0.0;
    let mut purchases = 0.0;
    let mut purchase_value = 0.0;
    let mut currency = None;

    for row in rows {
        spend += row
            .spend
            .as_ref()
            .and_then(finite_number)
            .unwrap_or(0.0)
            .max(0.0);
        impressions += row
            .impressions
            .as_ref()
            .and_then(finite_number)
            .unwrap_or(0.0)
            .max(0.0);
        clicks += click_count(row);
        purchases += single_purchase_metric(row.actions.as_deref());
        purchase_value += single_purchase_metric(row.action_values.as_deref());
        if currency.is_none() {
            currency.clone_from(&row.currency);
        }
    }

    let ratios = derived_ratios(spend, impressions, clicks, purchase_value);

    #[allow(clippy::cast_possible_truncation)]
    let insight = PerformanceInsight {
        ad_id: ad.id.clone(),
        account_id: ad
            .account_id
            .clone()
            .unwrap_or_else(|| fallback_account_id.to_owned()),
        name: ad.name.clone(),
        spend,
        impressions: impressions as i64,
        clicks: clicks as i64,
        purchases,
        purchase_value,
        roas: ratios.roas,
        ctr: ratios.ctr,
        cpc: ratios.cpc,
        cpm: ratios.cpm,
        currency,
        date_preset: date_preset.to_owned(),
        fetched_at,
    };
    insight
}

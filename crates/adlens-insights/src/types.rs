//! Wire types for the insights API.
//!
//! Numeric fields arrive as numbers or as numeric strings depending on
//! endpoint version, and `outbound_clicks` can additionally be a list of
//! `{action_type, value}` entries — those fields stay as raw
//! [`serde_json::Value`]s and are interpreted by [`crate::metrics`].

use serde::Deserialize;
use serde_json::Value;

/// One ad as listed under an ad account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

/// An `{action_type, value}` entry from `actions` / `action_values` /
/// array-shaped `outbound_clicks`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionEntry {
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// One insights row for an ad. A response may carry several rows (one per
/// reporting window); totals are summed across them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightRow {
    #[serde(default)]
    pub spend: Option<Value>,
    #[serde(default)]
    pub impressions: Option<Value>,
    #[serde(default)]
    pub outbound_clicks: Option<Value>,
    #[serde(default)]
    pub inline_link_clicks: Option<Value>,
    #[serde(default)]
    pub clicks: Option<Value>,
    #[serde(default)]
    pub actions: Option<Vec<ActionEntry>>,
    #[serde(default)]
    pub action_values: Option<Vec<ActionEntry>>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Pagination cursor block on list responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

/// Envelope for `GET /{account_id}/ads` and `GET /{ad_id}/insights`.
#[derive(Debug, Deserialize)]
pub struct ListEnvelope<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insight_row_tolerates_mixed_numeric_shapes() {
        let json = r#"{
            "spend": "12.50",
            "impressions": 1000,
            "outbound_clicks": [{ "action_type": "outbound_click", "value": "42" }],
            "actions": [{ "action_type": "purchase", "value": 3 }]
        }"#;
        let row: InsightRow = serde_json::from_str(json).unwrap();
        assert!(row.spend.is_some());
        assert!(row.outbound_clicks.is_some());
        assert_eq!(row.actions.unwrap().len(), 1);
        assert!(row.inline_link_clicks.is_none());
    }

    #[test]
    fn list_envelope_defaults_to_empty_data() {
        let envelope: ListEnvelope<AdRef> = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_empty());
        assert!(envelope.paging.is_none());
    }
}

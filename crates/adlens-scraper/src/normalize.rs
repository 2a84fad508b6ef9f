//! Normalization of untyped provider records into the canonical
//! [`Ad`] entity.
//!
//! `normalize_record` is a total function: malformed input produces a
//! best-effort `Ad` through the per-field defaults in [`crate::extract`],
//! never an error. Determinism matters — normalizing the same record
//! twice with the same observation time yields identical values, which is
//! what makes the keyed upsert idempotent.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use adlens_core::Ad;

use crate::extract;

/// Substituted when a record carries no image candidate anywhere, so the
/// thumbnail field is never empty.
pub const PLACEHOLDER_THUMBNAIL_URL: &str = "https://assets.adlens.dev/placeholder-thumb.svg";

/// Per-run normalization state, passed explicitly instead of living in a
/// module-level flag so concurrent runs cannot interfere.
#[derive(Debug, Default)]
pub struct NormalizeContext {
    sample_logged: bool,
}

impl NormalizeContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the raw structure of the first record of a run at debug level.
    /// Provider shape changes show up here first.
    fn log_sample_once(&mut self, raw: &Value) {
        if !self.sample_logged {
            tracing::debug!(sample = %raw, "first raw record of run");
            self.sample_logged = true;
        }
    }
}

/// Maps one raw provider record to a canonical [`Ad`].
///
/// `resolved_brand_url` is the brand association decided by
/// [`crate::brand_match::resolve_brand_url`]; `observed_at` becomes
/// `last_seen` and is a parameter so the mapping itself stays pure.
#[must_use]
pub fn normalize_record(
    raw: &Value,
    resolved_brand_url: &str,
    observed_at: DateTime<Utc>,
    ctx: &mut NormalizeContext,
) -> Ad {
    ctx.log_sample_once(raw);

    let id = extract::provider_id(raw).unwrap_or_else(|| derived_id(raw));

    let thumbnail_url =
        extract::thumbnail_url(raw).unwrap_or_else(|| PLACEHOLDER_THUMBNAIL_URL.to_owned());

    let ad_library_url = extract::ad_library_url(raw);

    // The record's own page URL beats the resolver's guess when present.
    let brand_ad_library_url = raw
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| resolved_brand_url.to_owned(), ToOwned::to_owned);

    let ad_id = extract::ad_id_from_url(&ad_library_url)
        .or_else(|| extract::ad_id_from_url(&brand_ad_library_url));

    Ad {
        id,
        page_name: extract::page_name(raw),
        reach: extract::reach(raw),
        video_url: extract::video_url(raw),
        thumbnail_url,
        heading: extract::heading(raw),
        ad_copy: extract::ad_copy(raw),
        ad_library_url,
        brand_ad_library_url,
        first_seen: extract::first_seen(raw),
        last_seen: observed_at,
        start_date_formatted: extract::start_date_formatted(raw),
        ad_id,
    }
}

/// Stable fallback identity for records without any id-ish field: a
/// SHA-256 digest of the serialized record. Re-ingesting the same record
/// maps to the same row.
fn derived_id(raw: &Value) -> String {
    let serialized = raw.to_string();
    let digest = Sha256::digest(serialized.as_bytes());
    format!("derived-{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn observed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 10, 0, 0).unwrap()
    }

    fn full_record() -> Value {
        json!({
            "ad_archive_id": "884422",
            "page_name": "Lumina Skin",
            "url": "https://example.com/ads/library/?view_all_page_id=111",
            "ad_library_url": "https://example.com/ads/library/?id=884422",
            "aaa_info": { "eu_total_reach": 150_000 },
            "first_seen": "2025-11-24 08:00:00",
            "start_date_formatted": "2025-11-24",
            "snapshot": {
                "title": "{{product.name}}",
                "cards": [{
                    "title": "Get Glowing Skin in 7 Days",
                    "body": "Stop masking your skin problems.",
                    "video_hd_url": "https://cdn.example.com/hd.mp4",
                    "resized_image_url": "https://cdn.example.com/thumb.jpg"
                }]
            }
        })
    }

    #[test]
    fn normalizes_a_fully_shaped_record() {
        let mut ctx = NormalizeContext::new();
        let ad = normalize_record(&full_record(), "https://example.com/brand", observed_at(), &mut ctx);

        assert_eq!(ad.id, "884422");
        assert_eq!(ad.page_name, "Lumina Skin");
        assert_eq!(ad.reach, 150_000);
        assert_eq!(ad.video_url, "https://cdn.example.com/hd.mp4");
        assert_eq!(ad.thumbnail_url, "https://cdn.example.com/thumb.jpg");
        assert_eq!(ad.heading, "Get Glowing Skin in 7 Days");
        assert_eq!(ad.ad_copy, "Stop masking your skin problems.");
        assert_eq!(ad.ad_id.as_deref(), Some("884422"));
        assert_eq!(
            ad.brand_ad_library_url,
            "https://example.com/ads/library/?view_all_page_id=111"
        );
        assert_eq!(
            ad.first_seen.unwrap().to_rfc3339(),
            "2025-11-24T08:00:00+00:00"
        );
        assert_eq!(ad.last_seen, observed_at());
    }

    #[test]
    fn normalizing_twice_is_byte_identical() {
        let raw = full_record();
        let mut ctx = NormalizeContext::new();
        let first = normalize_record(&raw, "https://example.com/brand", observed_at(), &mut ctx);
        let second = normalize_record(&raw, "https://example.com/brand", observed_at(), &mut ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_record_gets_defaults_and_placeholder() {
        let mut ctx = NormalizeContext::new();
        let ad = normalize_record(&json!({}), "", observed_at(), &mut ctx);

        assert!(ad.id.starts_with("derived-"));
        assert_eq!(ad.page_name, "Unknown");
        assert_eq!(ad.reach, 0);
        assert_eq!(ad.video_url, "");
        assert_eq!(ad.thumbnail_url, PLACEHOLDER_THUMBNAIL_URL);
        assert_eq!(ad.heading, "");
        assert_eq!(ad.ad_copy, "");
        assert_eq!(ad.first_seen, None);
        assert_eq!(ad.ad_id, None);
    }

    #[test]
    fn derived_id_is_stable_across_calls() {
        let raw = json!({ "heading": "no identity at all" });
        let mut ctx = NormalizeContext::new();
        let a = normalize_record(&raw, "", observed_at(), &mut ctx);
        let b = normalize_record(&raw, "", observed_at(), &mut ctx);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn resolver_url_used_when_record_has_no_own_url() {
        let raw = json!({ "ad_archive_id": "1" });
        let mut ctx = NormalizeContext::new();
        let ad = normalize_record(&raw, "https://example.com/resolved", observed_at(), &mut ctx);
        assert_eq!(ad.brand_ad_library_url, "https://example.com/resolved");
    }

    #[test]
    fn ad_id_falls_back_to_brand_url() {
        let raw = json!({
            "ad_archive_id": "1",
            "url": "https://example.com/ads/library/?id=5551212"
        });
        let mut ctx = NormalizeContext::new();
        let ad = normalize_record(&raw, "", observed_at(), &mut ctx);
        assert_eq!(ad.ad_id.as_deref(), Some("5551212"));
    }

    #[test]
    fn malformed_nested_shapes_never_panic() {
        // cards as an object, videos as a number, image as an array.
        let raw = json!({
            "snapshot": { "cards": { "not": "an array" } },
            "videos": 7,
            "image": ["nope"],
            "first_seen": 20_251_124
        });
        let mut ctx = NormalizeContext::new();
        let ad = normalize_record(&raw, "", observed_at(), &mut ctx);
        assert_eq!(ad.thumbnail_url, PLACEHOLDER_THUMBNAIL_URL);
        assert_eq!(ad.video_url, "");
        assert_eq!(ad.first_seen, None);
    }
}

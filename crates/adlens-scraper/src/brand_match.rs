//! Brand association for raw records.
//!
//! Raw records rarely carry an exact brand identifier, so association is
//! heuristic: exact URL equality, then substring containment in either
//! direction, then equality of the page-id query parameter. Containment
//! is inherently ambiguous when one brand's URL is a prefix of another's;
//! the ordering here deliberately preserves the observed provider
//! behavior rather than inventing a stricter rule.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// The record's own URL candidate: `ad_library_url`, then `url`, then
/// `ad_snapshot_url` — first non-empty string wins.
#[must_use]
pub fn candidate_url(raw: &Value) -> Option<&str> {
    ["ad_library_url", "url", "ad_snapshot_url"]
        .iter()
        .find_map(|key| {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
}

fn page_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]view_all_page_id=(\d+)").expect("static regex must compile"))
}

/// Extracts the `view_all_page_id` query parameter, when present.
#[must_use]
pub fn page_id_param(url: &str) -> Option<&str> {
    page_id_regex()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resolves the raw record to one of the session's known brand URLs.
///
/// Matching order: exact equality, substring containment (either
/// direction), page-id parameter equality. When nothing matches, falls
/// back to the record's own URL, then the first known brand URL, then an
/// empty string.
#[must_use]
pub fn resolve_brand_url(raw: &Value, known_brand_urls: &[String]) -> String {
    let candidate = candidate_url(raw);

    if let Some(item_url) = candidate {
        if let Some(exact) = known_brand_urls.iter().find(|known| *known == item_url) {
            return exact.clone();
        }
        if let Some(contained) = known_brand_urls
            .iter()
            .find(|known| item_url.contains(known.as_str()) || known.contains(item_url))
        {
            return contained.clone();
        }
        if let Some(item_page_id) = page_id_param(item_url) {
            if let Some(by_page_id) = known_brand_urls
                .iter()
                .find(|known| page_id_param(known) == Some(item_page_id))
            {
                return by_page_id.clone();
            }
        }
    }

    candidate
        .map(ToOwned::to_owned)
        .or_else(|| known_brand_urls.first().cloned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known() -> Vec<String> {
        vec![
            "https://example.com/ads/library/?view_all_page_id=111".to_owned(),
            "https://example.com/ads/library/?view_all_page_id=222".to_owned(),
        ]
    }

    #[test]
    fn exact_match_wins() {
        let raw = json!({
            "ad_library_url": "https://example.com/ads/library/?view_all_page_id=222"
        });
        assert_eq!(
            resolve_brand_url(&raw, &known()),
            "https://example.com/ads/library/?view_all_page_id=222"
        );
    }

    #[test]
    fn containment_matches_in_either_direction() {
        let raw = json!({
            "url": "https://example.com/ads/library/?view_all_page_id=111&active_status=all"
        });
        assert_eq!(
            resolve_brand_url(&raw, &known()),
            "https://example.com/ads/library/?view_all_page_id=111"
        );
    }

    #[test]
    fn page_id_param_matches_when_urls_differ() {
        let raw = json!({
            "ad_snapshot_url": "https://other.example.org/library?view_all_page_id=222&ref=x"
        });
        assert_eq!(
            resolve_brand_url(&raw, &known()),
            "https://example.com/ads/library/?view_all_page_id=222"
        );
    }

    #[test]
    fn unmatched_record_falls_back_to_its_own_url() {
        let raw = json!({ "ad_library_url": "https://unrelated.example.net/x" });
        assert_eq!(
            resolve_brand_url(&raw, &known()),
            "https://unrelated.example.net/x"
        );
    }

    #[test]
    fn record_without_url_falls_back_to_first_known_brand() {
        let raw = json!({ "heading": "no urls at all" });
        assert_eq!(
            resolve_brand_url(&raw, &known()),
            "https://example.com/ads/library/?view_all_page_id=111"
        );
    }

    #[test]
    fn nothing_known_and_no_url_yields_empty_string() {
        let raw = json!({});
        assert_eq!(resolve_brand_url(&raw, &[]), "");
    }

    #[test]
    fn candidate_url_order() {
        let raw = json!({
            "ad_snapshot_url": "https://example.com/snap",
            "url": "https://example.com/page",
            "ad_library_url": "https://example.com/lib"
        });
        assert_eq!(candidate_url(&raw), Some("https://example.com/lib"));
    }
}

//! Per-field extraction from untyped provider records.
//!
//! The provider has shipped at least a dozen shapes for the same logical
//! record; the same field can live under several nesting paths depending
//! on provider version. Each field is therefore an ordered list of small
//! extractor steps — the order encodes provider-version precedence and
//! must not be reshuffled. Absence at every step yields an explicit
//! default, never an error.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;

/// Known nesting paths of the `cards` array, in precedence order.
const CARD_PATHS: [&[&str]; 4] = [
    &["snapshot", "cards"],
    &["ad_snapshot_data", "snapshot", "cards"],
    &["cards"],
    &["ad_snapshot_data", "cards"],
];

/// Template-level heading candidates, tried after card titles.
const HEADING_PATHS: [&[&str]; 15] = [
    &["heading"],
    &["title"],
    &["adTitle"],
    &["adText"],
    &["headline"],
    &["ad_snapshot_data", "title"],
    &["ad_snapshot_data", "adTitle"],
    &["ad_snapshot_data", "adText"],
    &["ad_snapshot_data", "snapshot", "title"],
    &["ad_snapshot_data", "snapshot", "adTitle"],
    &["ad_snapshot_data", "snapshot", "adText"],
    &["ad_snapshot_data", "body"],
    &["snapshot", "title"],
    &["snapshot", "adTitle"],
    &["snapshot", "adText"],
];

/// Template-level ad-copy candidates, tried after card bodies.
const AD_COPY_PATHS: [&[&str]; 18] = [
    &["ad_copy"],
    &["body"],
    &["text"],
    &["description"],
    &["adBody"],
    &["adText"],
    &["ad_snapshot_data", "body"],
    &["ad_snapshot_data", "text"],
    &["ad_snapshot_data", "adBody"],
    &["ad_snapshot_data", "adText"],
    &["ad_snapshot_data", "snapshot", "body"],
    &["ad_snapshot_data", "snapshot", "text"],
    &["ad_snapshot_data", "snapshot", "adBody"],
    &["ad_snapshot_data", "snapshot", "adText"],
    &["snapshot", "body"],
    &["snapshot", "text"],
    &["snapshot", "adBody"],
    &["snapshot", "adText"],
];

/// Reach candidates: geography-scoped totals first, generic counts last.
const REACH_PATHS: [&[&str]; 7] = [
    &["aaa_info", "eu_total_reach"],
    &["transparency_by_location", "eu_transparency", "eu_total_reach"],
    &["reach_estimate"],
    &["reach"],
    &["reachLower"],
    &["reachUpper"],
    &["impressions"],
];

/// Raw date candidates for the first-seen timestamp.
const FIRST_SEEN_PATHS: [&[&str]; 5] = [
    &["first_seen"],
    &["firstSeen"],
    &["started_running"],
    &["start_date_formatted"],
    &["start_date"],
];

const PAGE_NAME_PATHS: [&[&str]; 5] = [
    &["page_name"],
    &["pageName"],
    &["snapshot", "page_name"],
    &["ad_snapshot_data", "page_name"],
    &["advertiser", "page", "name"],
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

/// Accepts a plain string or an object carrying its text under `text`.
/// Some provider versions materialize body fields either way.
fn string_or_text(value: &Value) -> Option<&str> {
    non_empty_str(value).or_else(|| value.get("text").and_then(non_empty_str))
}

fn card_arrays(item: &Value) -> impl Iterator<Item = &Vec<Value>> {
    CARD_PATHS
        .into_iter()
        .filter_map(|path| get_path(item, path).and_then(Value::as_array))
}

// ---------------------------------------------------------------------------
// video_url
// ---------------------------------------------------------------------------

/// A video value: either a URL string or an object with one of the known
/// URL keys.
fn video_from_value(value: &Value) -> Option<&str> {
    non_empty_str(value)
        .or_else(|| value.get("url").and_then(non_empty_str))
        .or_else(|| value.get("video_hd_url").and_then(non_empty_str))
        .or_else(|| value.get("video_url").and_then(non_empty_str))
}

fn video_from_card(card: &Value) -> Option<&str> {
    card.get("video_hd_url")
        .and_then(non_empty_str)
        .or_else(|| card.get("video_url").and_then(non_empty_str))
        .or_else(|| card.get("videoUrl").and_then(non_empty_str))
        .or_else(|| card.get("video").and_then(video_from_value))
}

/// Extracts the video URL, scanning every card at every known nesting
/// path before falling back to `videos[0]` and top-level fields.
#[must_use]
pub fn video_url(item: &Value) -> String {
    for cards in card_arrays(item) {
        for card in cards {
            if let Some(url) = video_from_card(card) {
                return url.to_owned();
            }
        }
    }

    if let Some(first) = item
        .get("videos")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    {
        if let Some(url) = video_from_value(first) {
            return url.to_owned();
        }
    }

    item.get("video_hd_url")
        .and_then(non_empty_str)
        .or_else(|| item.get("video_url").and_then(non_empty_str))
        .or_else(|| item.get("videoUrl").and_then(non_empty_str))
        .or_else(|| item.get("video").and_then(video_from_value))
        .unwrap_or_default()
        .to_owned()
}

// ---------------------------------------------------------------------------
// thumbnail_url
// ---------------------------------------------------------------------------

fn image_from_card(card: &Value) -> Option<&str> {
    // Resized image beats the original (already sized for display).
    card.get("resized_image_url")
        .and_then(non_empty_str)
        .or_else(|| card.get("original_image_url").and_then(non_empty_str))
        .or_else(|| card.get("image_url").and_then(non_empty_str))
        .or_else(|| card.get("imageUrl").and_then(non_empty_str))
        .or_else(|| card.get("thumbnail_url").and_then(non_empty_str))
        .or_else(|| card.get("thumbnailUrl").and_then(non_empty_str))
        .or_else(|| card.get("thumbnail").and_then(non_empty_str))
        .or_else(|| {
            card.get("image")
                .and_then(|img| non_empty_str(img).or_else(|| img.get("url").and_then(non_empty_str)))
        })
}

/// Extracts a thumbnail candidate, or `None` when the record carries no
/// image anywhere. The normalizer substitutes the placeholder asset.
#[must_use]
pub fn thumbnail_url(item: &Value) -> Option<String> {
    let top_level = item
        .get("thumbnail_url")
        .and_then(non_empty_str)
        .or_else(|| item.get("thumbnailUrl").and_then(non_empty_str))
        .or_else(|| item.get("image_url").and_then(non_empty_str))
        .or_else(|| item.get("imageUrl").and_then(non_empty_str))
        .or_else(|| item.get("thumbnail").and_then(non_empty_str))
        .or_else(|| {
            item.get("image")
                .and_then(|img| non_empty_str(img).or_else(|| img.get("url").and_then(non_empty_str)))
        });
    if let Some(url) = top_level {
        return Some(url.to_owned());
    }

    for cards in card_arrays(item) {
        for card in cards {
            if let Some(url) = image_from_card(card) {
                return Some(url.to_owned());
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// heading / ad_copy
// ---------------------------------------------------------------------------

/// First card's field from any card path. Card-level text is the
/// materialized copy; template-level fields may hold unresolved template
/// variables, so cards always win.
fn first_card_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    card_arrays(item)
        .filter_map(|cards| cards.first())
        .find_map(|card| card.get(key).and_then(string_or_text))
}

#[must_use]
pub fn heading(item: &Value) -> String {
    if let Some(title) = first_card_field(item, "title") {
        return title.to_owned();
    }
    for path in HEADING_PATHS {
        if let Some(text) = get_path(item, path).and_then(string_or_text) {
            return text.to_owned();
        }
    }
    get_path(item, &["snapshot", "body"])
        .and_then(string_or_text)
        .unwrap_or_default()
        .to_owned()
}

#[must_use]
pub fn ad_copy(item: &Value) -> String {
    if let Some(body) = first_card_field(item, "body") {
        return body.to_owned();
    }
    for path in AD_COPY_PATHS {
        if let Some(text) = get_path(item, path).and_then(string_or_text) {
            return text.to_owned();
        }
    }
    String::new()
}

// ---------------------------------------------------------------------------
// reach
// ---------------------------------------------------------------------------

/// Coerces a JSON value to a non-negative integer count.
fn coerce_count(value: &Value) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    n.unwrap_or(0).max(0)
}

/// Extracts reach: the first present, non-zero-ish candidate wins and is
/// coerced; a chosen candidate that fails to parse yields 0 (it does not
/// fall through to later candidates).
#[must_use]
pub fn reach(item: &Value) -> i64 {
    for path in REACH_PATHS {
        match get_path(item, path) {
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => {
                return coerce_count(&Value::Number(n.clone()));
            }
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return coerce_count(&Value::String(s.clone()));
            }
            _ => {}
        }
    }
    0
}

// ---------------------------------------------------------------------------
// dates
// ---------------------------------------------------------------------------

fn datetime_shape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("static regex must compile")
    })
}

/// Parses the date shapes the provider actually emits.
///
/// The common `"YYYY-MM-DD HH:MM:SS"` shape gets a `T` separator inserted
/// before parsing; RFC 3339 strings and bare dates parse as-is. The
/// normalization is idempotent: feeding an already-ISO string through
/// again is a no-op. Anything else yields `None`, never an error.
#[must_use]
pub fn parse_provider_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if datetime_shape_regex().is_match(trimmed) {
        trimmed.replacen(' ', "T", 1)
    } else {
        trimmed.to_owned()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&candidate) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&candidate, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    None
}

/// Extracts the first-seen timestamp from whichever raw date field is
/// present. Unparsable values yield `None`.
#[must_use]
pub fn first_seen(item: &Value) -> Option<DateTime<Utc>> {
    for path in FIRST_SEEN_PATHS {
        if let Some(raw) = get_path(item, path).and_then(non_empty_str) {
            return parse_provider_date(raw);
        }
    }
    None
}

/// The provider's own start-date string, kept raw.
#[must_use]
pub fn start_date_formatted(item: &Value) -> Option<String> {
    item.get("start_date_formatted")
        .and_then(non_empty_str)
        .or_else(|| item.get("start_date").and_then(non_empty_str))
        .map(ToOwned::to_owned)
}

// ---------------------------------------------------------------------------
// identity
// ---------------------------------------------------------------------------

fn id_ish(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Provider-assigned identity, if the record carries one anywhere.
#[must_use]
pub fn provider_id(item: &Value) -> Option<String> {
    item.get("ad_archive_id")
        .and_then(id_ish)
        .or_else(|| item.get("id").and_then(id_ish))
        .or_else(|| item.get("adId").and_then(id_ish))
        .or_else(|| item.get("ad_snapshot_url").and_then(id_ish))
}

#[must_use]
pub fn page_name(item: &Value) -> String {
    for path in PAGE_NAME_PATHS {
        if let Some(name) = get_path(item, path).and_then(non_empty_str) {
            return name.to_owned();
        }
    }
    "Unknown".to_owned()
}

#[must_use]
pub fn ad_library_url(item: &Value) -> String {
    item.get("ad_library_url")
        .and_then(non_empty_str)
        .or_else(|| item.get("adSnapshotUrl").and_then(non_empty_str))
        .unwrap_or_default()
        .to_owned()
}

fn ad_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]id=(\d+)").expect("static regex must compile"))
}

/// Parses the numeric `id=` query parameter out of a library URL.
#[must_use]
pub fn ad_id_from_url(url: &str) -> Option<String> {
    ad_id_regex()
        .captures(url)
        .map(|caps| caps[1].to_owned())
}

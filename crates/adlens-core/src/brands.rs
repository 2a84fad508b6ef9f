//! Brand display-name derivation.
//!
//! Newly-added brands only carry an ad-library URL; a human-readable name
//! is derived from it and later reconciled against the page names actually
//! observed in scraped records.

/// Derives a display name from an ad-library URL.
///
/// Tries, in order: a `page_name`/`page` query parameter, the last path
/// segment (dashes become spaces), the hostname without a leading `www.`.
/// Falls back to `"Unknown Brand"` when nothing usable is present.
#[must_use]
pub fn name_from_url(url: &str) -> String {
    if let Some(name) = query_param(url, "page_name").or_else(|| query_param(url, "page")) {
        return name;
    }

    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let without_query = without_scheme.split(['?', '#']).next().unwrap_or("");
    let mut segments = without_query.split('/').filter(|s| !s.is_empty());

    let host = segments.next().unwrap_or("");
    let last_segment = segments.last();

    if let Some(segment) = last_segment {
        let name = segment.replace('-', " ");
        if !name.trim().is_empty() {
            return name;
        }
    }

    let host_name = host
        .trim_start_matches("www.")
        .split('.')
        .next()
        .unwrap_or("");
    if host_name.is_empty() {
        "Unknown Brand".to_string()
    } else {
        host_name.to_string()
    }
}

/// Extracts a query parameter value, percent-decoding spaces only.
fn query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split('?').nth(1)?;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        if parts.next() == Some(key) {
            let raw = parts.next().unwrap_or("");
            if raw.is_empty() {
                return None;
            }
            return Some(raw.replace('+', " ").replace("%20", " "));
        }
    }
    None
}

/// A page name usable for brand reconciliation: non-empty, not the
/// "Unknown" sentinel, and not purely numeric (a page id leaked as name).
#[must_use]
pub fn is_usable_page_name(name: &str) -> bool {
    !name.is_empty() && name != "Unknown" && !name.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_page_name_query_param() {
        let url = "https://www.facebook.com/ads/library/?page_name=Lumina+Skin&id=1";
        assert_eq!(name_from_url(url), "Lumina Skin");
    }

    #[test]
    fn falls_back_to_last_path_segment() {
        let url = "https://example.com/brands/lumina-skin";
        assert_eq!(name_from_url(url), "lumina skin");
    }

    #[test]
    fn falls_back_to_hostname() {
        assert_eq!(name_from_url("https://www.techflow.io/"), "techflow");
        assert_eq!(name_from_url("https://ecofresh.dk"), "ecofresh");
    }

    #[test]
    fn unparsable_input_yields_placeholder() {
        assert_eq!(name_from_url(""), "Unknown Brand");
    }

    #[test]
    fn usable_page_name_rejects_sentinels() {
        assert!(is_usable_page_name("Lumina Skin"));
        assert!(!is_usable_page_name(""));
        assert!(!is_usable_page_name("Unknown"));
        assert!(!is_usable_page_name("123456789"));
    }
}

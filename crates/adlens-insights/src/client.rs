//! HTTP client for the advertising-insights API.
//!
//! Wraps `reqwest` with token management, the API's `error` envelope
//! check, and cursor-based pagination for per-account ad listings.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::InsightsError;
use crate::types::{AdRef, InsightRow, ListEnvelope};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v21.0";

/// Page size for ad listings; a short page means the listing is done.
const LIST_PAGE_SIZE: usize = 100;

pub struct InsightsClient {
    client: Client,
    token: Option<String>,
    base_url: Url,
}

impl InsightsClient {
    /// Creates a client pointed at the production insights API.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(token: Option<String>, timeout_secs: u64) -> Result<Self, InsightsError> {
        Self::with_base_url(token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`InsightsError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        token: Option<String>,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, InsightsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("adlens/0.1 (ad-intelligence)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| InsightsError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            token,
            base_url,
        })
    }

    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// As in [`InsightsClient::with_base_url`].
    pub fn from_app_config(config: &adlens_core::AppConfig) -> Result<Self, InsightsError> {
        Self::with_base_url(
            config.insights_api_token.clone(),
            config.insights_request_timeout_secs,
            &config.insights_base_url,
        )
    }

    /// Lists ads under an ad account, following pagination cursors until
    /// `max_ads` is reached or a short page arrives.
    ///
    /// # Errors
    ///
    /// - [`InsightsError::MissingToken`] when no token is configured.
    /// - [`InsightsError::ApiError`] if the API returns an error body.
    /// - [`InsightsError::Http`] on network failure or non-2xx status.
    /// - [`InsightsError::Deserialize`] on an unexpected response shape.
    pub async fn list_ads(
        &self,
        account_id: &str,
        max_ads: usize,
    ) -> Result<Vec<AdRef>, InsightsError> {
        let mut url = self.build_url(&format!("{account_id}/ads"))?;
        url.query_pairs_mut()
            .append_pair("fields", "id,name,account_id")
            .append_pair("limit", &LIST_PAGE_SIZE.to_string());

        let mut all = Vec::new();
        let mut next: Option<Url> = Some(url);

        while let Some(page_url) = next.take() {
            if all.len() >= max_ads {
                break;
            }
            let body = self.request_json(page_url.clone()).await?;
            let envelope: ListEnvelope<AdRef> =
                serde_json::from_value(body).map_err(|e| InsightsError::Deserialize {
                    context: format!("list_ads(account_id={account_id})"),
                    source: e,
                })?;

            let page_len = envelope.data.len();
            all.extend(envelope.data);

            // A full page plus a cursor means there may be more.
            if page_len == LIST_PAGE_SIZE {
                next = envelope
                    .paging
                    .and_then(|p| p.next)
                    .and_then(|n| Url::parse(&n).ok());
            }
        }

        all.truncate(max_ads);
        Ok(all)
    }

    /// Fetches the raw insight rows for one ad over a date preset.
    ///
    /// # Errors
    ///
    /// Same as [`InsightsClient::list_ads`].
    pub async fn get_insights(
        &self,
        ad_id: &str,
        date_preset: &str,
    ) -> Result<Vec<InsightRow>, InsightsError> {
        let mut url = self.build_url(&format!("{ad_id}/insights"))?;
        url.query_pairs_mut()
            .append_pair(
                "fields",
                "spend,impressions,outbound_clicks,inline_link_clicks,clicks,actions,action_values,currency",
            )
            .append_pair("date_preset", date_preset);

        let body = self.request_json(url).await?;
        let envelope: ListEnvelope<InsightRow> =
            serde_json::from_value(body).map_err(|e| InsightsError::Deserialize {
                context: format!("get_insights(ad_id={ad_id})"),
                source: e,
            })?;
        Ok(envelope.data)
    }

    fn build_url(&self, path: &str) -> Result<Url, InsightsError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| InsightsError::ApiError(format!("invalid request path '{path}': {e}")))?;
        let token = self.token.as_deref().ok_or(InsightsError::MissingToken)?;
        url.query_pairs_mut().append_pair("access_token", token);
        Ok(url)
    }

    async fn request_json(&self, url: Url) -> Result<serde_json::Value, InsightsError> {
        let response = self.client.get(url.clone()).send().await?;
        let response = response.error_for_status()?;
        let text = response.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| InsightsError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown insights API error")
                .to_string();
            return Err(InsightsError::ApiError(message));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client(base_url: &str) -> InsightsClient {
        InsightsClient::with_base_url(Some("test-token".to_owned()), 30, base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn missing_token_is_an_error() {
        let client = InsightsClient::with_base_url(None, 30, "https://graph.example.com").unwrap();
        assert!(matches!(
            client.build_url("act_1/ads"),
            Err(InsightsError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn list_ads_reads_a_single_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/act_1/ads"))
            .and(query_param("access_token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "id": "a1", "name": "Ad one", "account_id": "act_1" },
                    { "id": "a2" }
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let ads = client.list_ads("act_1", 100).await.unwrap();
        assert_eq!(ads.len(), 2);
        assert_eq!(ads[0].id, "a1");
        assert_eq!(ads[1].name, None);
    }

    #[tokio::test]
    async fn list_ads_follows_full_page_cursors_and_caps_at_max() {
        let server = MockServer::start().await;
        let first_page: Vec<_> = (0..100).map(|i| json!({ "id": format!("a{i}") })).collect();
        Mock::given(method("GET"))
            .and(path("/act_1/ads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": first_page,
                "paging": { "next": format!("{}/act_1/ads_page2?access_token=test-token", server.uri()) }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/act_1/ads_page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "a100" }, { "id": "a101" }]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let ads = client.list_ads("act_1", 101).await.unwrap();
        assert_eq!(ads.len(), 101);
        assert_eq!(ads.last().unwrap().id, "a100");
    }

    #[tokio::test]
    async fn get_insights_surfaces_api_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/120210/insights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": { "message": "(#100) Missing permissions", "code": 100 }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.get_insights("120210", "last_30d").await;
        assert!(
            matches!(result, Err(InsightsError::ApiError(ref msg)) if msg.contains("Missing permissions"))
        );
    }

    #[tokio::test]
    async fn get_insights_parses_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/120210/insights"))
            .and(query_param("date_preset", "last_7d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "spend": "12.34",
                    "impressions": "2000",
                    "actions": [{ "action_type": "purchase", "value": "2" }]
                }]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let rows = client.get_insights("120210", "last_7d").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].spend.is_some());
    }
}

//! HTTP client for the scrape-provider REST API.
//!
//! Wraps `reqwest` with provider-specific error handling, token
//! management, and typed response deserialization. Every endpoint checks
//! the provider's `error` envelope and surfaces it as
//! [`ScrapeError::ApiError`].

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::ScrapeError;
use crate::retry::retry_with_backoff;
use crate::types::{DataEnvelope, RunInfo, TriggeredRun};

const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

/// Client for the scrape-provider REST API.
///
/// Use [`ScrapeClient::from_app_config`] in binaries or
/// [`ScrapeClient::with_base_url`] to point at a mock server in tests.
pub struct ScrapeClient {
    client: Client,
    token: Option<String>,
    actor_id: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ScrapeClient {
    /// Creates a client pointed at the production provider API.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        token: Option<String>,
        actor_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, ScrapeError> {
        Self::with_base_url(token, actor_id, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ScrapeError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        token: Option<String>,
        actor_id: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("adlens/0.1 (ad-intelligence)")
            .build()?;

        // Normalise: exactly one trailing slash so Url::join appends path
        // segments instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ScrapeError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            token,
            actor_id: actor_id.to_owned(),
            base_url,
            max_retries: 3,
            backoff_base_ms: 1_000,
        })
    }

    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] or [`ScrapeError::ApiError`] as in
    /// [`ScrapeClient::with_base_url`].
    pub fn from_app_config(config: &adlens_core::AppConfig) -> Result<Self, ScrapeError> {
        let mut client = Self::with_base_url(
            config.scrape_api_token.clone(),
            &config.scrape_actor_id,
            config.scrape_request_timeout_secs,
            &config.scrape_base_url,
        )?;
        client.max_retries = config.scrape_max_retries;
        client.backoff_base_ms = config.scrape_retry_backoff_base_ms;
        Ok(client)
    }

    /// Starts an actor run scraping the given ad-library target URLs.
    ///
    /// The run executes asynchronously on the provider side; the caller
    /// polls [`ScrapeClient::get_run`] for completion.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::NoActiveTargets`] when `targets` is empty.
    /// - [`ScrapeError::MissingToken`] when no API token is configured.
    /// - [`ScrapeError::ApiError`] if the provider rejects the input.
    /// - [`ScrapeError::Http`] on network failure (after retries).
    /// - [`ScrapeError::Deserialize`] on an unexpected response shape.
    pub async fn trigger_run(&self, targets: &[String]) -> Result<TriggeredRun, ScrapeError> {
        if targets.is_empty() {
            return Err(ScrapeError::NoActiveTargets);
        }

        let input = serde_json::json!({
            "count": 300,
            "period": "last30d",
            "scrapeAdDetails": true,
            "scrapePageAds.activeStatus": "all",
            "scrapePageAds.countryCode": "ALL",
            "urls": targets
                .iter()
                .map(|url| serde_json::json!({ "url": url, "method": "GET" }))
                .collect::<Vec<_>>(),
        });

        let url = self.build_url(&format!("acts/{}/runs", self.actor_id), true)?;

        let body = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let input = input.clone();
            async move {
                let response = self.client.post(url.clone()).json(&input).send().await?;
                Self::read_json(&url, response).await
            }
        })
        .await?;

        let envelope: DataEnvelope<TriggeredRun> =
            serde_json::from_value(body).map_err(|e| ScrapeError::Deserialize {
                context: format!("trigger_run(targets={})", targets.len()),
                source: e,
            })?;

        tracing::info!(run_id = %envelope.data.id, targets = targets.len(), "scrape run triggered");
        Ok(envelope.data)
    }

    /// Fetches the current state of a run.
    ///
    /// Not retried here: the orchestrator's next poll tick is the retry.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::ApiError`] if the provider reports an error.
    /// - [`ScrapeError::Http`] on network failure or non-2xx status.
    /// - [`ScrapeError::Deserialize`] on an unexpected response shape.
    pub async fn get_run(&self, run_id: &str) -> Result<RunInfo, ScrapeError> {
        let url = self.build_url(&format!("actor-runs/{run_id}"), true)?;
        let response = self.client.get(url.clone()).send().await?;
        let body = Self::read_json(&url, response).await?;

        let envelope: DataEnvelope<RunInfo> =
            serde_json::from_value(body).map_err(|e| ScrapeError::Deserialize {
                context: format!("get_run(run_id={run_id})"),
                source: e,
            })?;

        Ok(envelope.data)
    }

    /// Fetches all items of a run's dataset as untyped JSON records.
    ///
    /// The records are provider-controlled and deliberately left untyped;
    /// normalization happens in [`crate::normalize`].
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::ApiError`] if the provider reports an error.
    /// - [`ScrapeError::Http`] on network failure or non-2xx status.
    /// - [`ScrapeError::Deserialize`] if the body is not a JSON array.
    pub async fn dataset_items(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<serde_json::Value>, ScrapeError> {
        let mut url = self.build_url(&format!("datasets/{dataset_id}/items"), true)?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("clean", "true");

        let response = self.client.get(url.clone()).send().await?;
        let body = Self::read_json(&url, response).await?;

        serde_json::from_value(body).map_err(|e| ScrapeError::Deserialize {
            context: format!("dataset_items(dataset_id={dataset_id})"),
            source: e,
        })
    }

    /// Builds a request URL under the base, optionally appending the token.
    fn build_url(&self, path: &str, with_token: bool) -> Result<Url, ScrapeError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ScrapeError::ApiError(format!("invalid request path '{path}': {e}")))?;
        if with_token {
            let token = self.token.as_deref().ok_or(ScrapeError::MissingToken)?;
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    /// Asserts a 2xx status, parses the body as JSON, and checks the
    /// provider's `error` envelope.
    async fn read_json(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<serde_json::Value, ScrapeError> {
        let response = response.error_for_status()?;
        let text = response.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ScrapeError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown provider error")
                .to_string();
            return Err(ScrapeError::ApiError(message));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client(base_url: &str) -> ScrapeClient {
        ScrapeClient::with_base_url(
            Some("test-token".to_owned()),
            "acme~ads-library-scraper",
            30,
            base_url,
        )
        .expect("client construction should not fail")
    }

    #[test]
    fn build_url_appends_token() {
        let client = test_client("https://api.example.com/v2");
        let url = client.build_url("actor-runs/r1", true).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v2/actor-runs/r1?token=test-token"
        );
    }

    #[test]
    fn missing_token_is_an_error() {
        let client =
            ScrapeClient::with_base_url(None, "acme~scraper", 30, "https://api.example.com/v2")
                .unwrap();
        let result = client.build_url("actor-runs/r1", true);
        assert!(matches!(result, Err(ScrapeError::MissingToken)));
    }

    #[tokio::test]
    async fn trigger_run_with_no_targets_fails_fast() {
        let client = test_client("https://api.example.com/v2");
        let result = client.trigger_run(&[]).await;
        assert!(matches!(result, Err(ScrapeError::NoActiveTargets)));
    }

    #[tokio::test]
    async fn trigger_run_posts_targets_and_parses_run_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/acts/acme~ads-library-scraper/runs"))
            .and(query_param("token", "test-token"))
            .and(body_partial_json(serde_json::json!({
                "urls": [{ "url": "https://example.com/ads/library/?view_all_page_id=1" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "run-1", "defaultDatasetId": "ds-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let run = client
            .trigger_run(&["https://example.com/ads/library/?view_all_page_id=1".to_owned()])
            .await
            .unwrap();
        assert_eq!(run.id, "run-1");
        assert_eq!(run.default_dataset_id.as_deref(), Some("ds-1"));
    }

    #[tokio::test]
    async fn get_run_surfaces_provider_error_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/actor-runs/missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": { "type": "record-not-found", "message": "Run was not found" }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.get_run("missing").await;
        assert!(
            matches!(result, Err(ScrapeError::ApiError(ref msg)) if msg == "Run was not found")
        );
    }

    #[tokio::test]
    async fn dataset_items_parses_untyped_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/datasets/ds-1/items"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "ad_archive_id": "a1", "reach": 100 },
                { "ad_archive_id": "a2" }
            ])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let items = client.dataset_items("ds-1").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["ad_archive_id"], "a1");
    }
}

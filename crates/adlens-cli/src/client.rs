//! Thin HTTP client for the adlens server API, plus the [`StatusPoll`]
//! implementation the orchestrator drives.

use anyhow::Context;
use reqwest::Url;
use serde::Deserialize;

use adlens_core::{Ad, Brand};
use adlens_scraper::{PollOutcome, ScrapeError, StatusPoll};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TriggerData {
    run_id: String,
    targets: usize,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    ads: Option<Vec<Ad>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrandsData {
    brands: Vec<Brand>,
}

#[derive(Debug, Deserialize)]
pub struct SyncPage {
    pub synced: usize,
    pub account_offset: usize,
    pub has_more: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&normalised)
                .with_context(|| format!("invalid server URL '{base_url}'"))?,
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid request path '{path}'"))
    }

    pub async fn add_brand(&self, session_id: &str, url: &str) -> anyhow::Result<Brand> {
        let response = self
            .http
            .post(self.url("api/v1/brands")?)
            .json(&serde_json::json!({ "session_id": session_id, "url": url }))
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<Brand> = response.json().await?;
        Ok(envelope.data)
    }

    pub async fn list_brands(&self, session_id: &str) -> anyhow::Result<Vec<Brand>> {
        let mut url = self.url("api/v1/brands")?;
        url.query_pairs_mut().append_pair("session_id", session_id);
        let response = self.http.get(url).send().await?.error_for_status()?;
        let envelope: Envelope<BrandsData> = response.json().await?;
        Ok(envelope.data.brands)
    }

    pub async fn delete_brand(&self, session_id: &str, brand_id: i64) -> anyhow::Result<()> {
        self.http
            .delete(self.url("api/v1/brands")?)
            .json(&serde_json::json!({ "session_id": session_id, "brand_id": brand_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Triggers a scrape run; returns the provider run id and how many
    /// brand targets it covers.
    pub async fn trigger_scrape(&self, session_id: &str) -> anyhow::Result<(String, usize)> {
        let response = self
            .http
            .post(self.url("api/v1/scrape")?)
            .json(&serde_json::json!({ "session_id": session_id }))
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<TriggerData> = response.json().await?;
        Ok((envelope.data.run_id, envelope.data.targets))
    }

    pub async fn sync_insights_page(
        &self,
        date_preset: Option<&str>,
        account_offset: usize,
    ) -> anyhow::Result<SyncPage> {
        let response = self
            .http
            .post(self.url("api/v1/sync-insights")?)
            .json(&serde_json::json!({
                "date_preset": date_preset,
                "account_offset": account_offset,
            }))
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<SyncPage> = response.json().await?;
        Ok(envelope.data)
    }
}

/// Polls the server's scrape-status endpoint for the orchestrator.
pub struct HttpStatusPoll {
    client: ApiClient,
    session_id: String,
}

impl HttpStatusPoll {
    #[must_use]
    pub fn new(client: ApiClient, session_id: String) -> Self {
        Self { client, session_id }
    }
}

impl StatusPoll for HttpStatusPoll {
    async fn check(&mut self, run_id: &str) -> Result<PollOutcome, ScrapeError> {
        let mut url = self
            .client
            .url("api/v1/scrape-status")
            .map_err(|e| ScrapeError::ApiError(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("run_id", run_id)
            .append_pair("session_id", &self.session_id);

        let response = self.client.http.get(url.clone()).send().await?;
        let response = response.error_for_status()?;
        let text = response.text().await?;
        let envelope: Envelope<StatusData> =
            serde_json::from_str(&text).map_err(|e| ScrapeError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        let data = envelope.data;
        Ok(match data.status.as_str() {
            "COMPLETED" => PollOutcome::Completed(data.ads.unwrap_or_default()),
            "FAILED" => PollOutcome::Failed(
                data.message.unwrap_or_else(|| "run failed".to_owned()),
            ),
            _ => PollOutcome::Running,
        })
    }
}

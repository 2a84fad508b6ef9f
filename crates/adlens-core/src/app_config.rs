use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    /// Base URL of the external scrape-job provider API.
    pub scrape_base_url: String,
    /// API token for the scrape provider; triggering a run requires it.
    pub scrape_api_token: Option<String>,
    /// Identifier of the provider-side actor that performs the scrape.
    pub scrape_actor_id: String,
    pub scrape_request_timeout_secs: u64,
    pub scrape_max_retries: u32,
    pub scrape_retry_backoff_base_ms: u64,
    /// Initial poll cadence while waiting for a run to finish.
    pub scrape_poll_interval_secs: u64,
    /// Escalated cadence once the wait budget is exhausted.
    pub scrape_fast_poll_interval_secs: u64,
    /// User-facing wait budget for a fresh trigger.
    pub scrape_wait_budget_secs: u64,
    /// Overtime past the budget before the orchestrator gives up.
    pub scrape_overtime_secs: u64,

    /// Base URL of the advertising-insights API.
    pub insights_base_url: String,
    pub insights_api_token: Option<String>,
    /// Ad accounts to sync insights for, in configured order.
    pub insights_ad_accounts: Vec<String>,
    pub insights_request_timeout_secs: u64,
    /// Cron expression for the background insights refresh job.
    pub insights_refresh_cron: String,
    /// Max ads re-fetched per scheduled refresh.
    pub insights_refresh_batch: usize,

    /// Concurrent ad upserts during dataset ingestion.
    pub ingest_concurrency: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("scrape_base_url", &self.scrape_base_url)
            .field(
                "scrape_api_token",
                &self.scrape_api_token.as_ref().map(|_| "[redacted]"),
            )
            .field("scrape_actor_id", &self.scrape_actor_id)
            .field(
                "scrape_request_timeout_secs",
                &self.scrape_request_timeout_secs,
            )
            .field("scrape_max_retries", &self.scrape_max_retries)
            .field(
                "scrape_retry_backoff_base_ms",
                &self.scrape_retry_backoff_base_ms,
            )
            .field(
                "scrape_poll_interval_secs",
                &self.scrape_poll_interval_secs,
            )
            .field(
                "scrape_fast_poll_interval_secs",
                &self.scrape_fast_poll_interval_secs,
            )
            .field("scrape_wait_budget_secs", &self.scrape_wait_budget_secs)
            .field("scrape_overtime_secs", &self.scrape_overtime_secs)
            .field("insights_base_url", &self.insights_base_url)
            .field(
                "insights_api_token",
                &self.insights_api_token.as_ref().map(|_| "[redacted]"),
            )
            .field("insights_ad_accounts", &self.insights_ad_accounts)
            .field(
                "insights_request_timeout_secs",
                &self.insights_request_timeout_secs,
            )
            .field("insights_refresh_cron", &self.insights_refresh_cron)
            .field("insights_refresh_batch", &self.insights_refresh_batch)
            .field("ingest_concurrency", &self.ingest_concurrency)
            .finish()
    }
}

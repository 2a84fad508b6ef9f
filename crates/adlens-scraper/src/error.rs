use thiserror::Error;

/// Errors returned by the scrape-provider client and orchestrator.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Triggering was requested for a session with no active brands.
    #[error("no active scrape targets for this session")]
    NoActiveTargets,

    /// Triggering requires a provider API token and none is configured.
    #[error("scrape provider API token is not configured")]
    MissingToken,

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned an error envelope with a message.
    #[error("scrape provider error: {0}")]
    ApiError(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

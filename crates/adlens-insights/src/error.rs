use thiserror::Error;

/// Errors returned by the insights API client.
#[derive(Debug, Error)]
pub enum InsightsError {
    /// Insights calls require an API token and none is configured.
    #[error("insights API token is not configured")]
    MissingToken,

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error body with a message.
    #[error("insights API error: {0}")]
    ApiError(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

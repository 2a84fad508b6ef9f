//! Wire types for the scrape-provider REST API.
//!
//! The provider wraps every response in a `data` envelope. Run status is
//! kept as the provider's raw string — new statuses appear between
//! provider versions, and anything unrecognized is treated as still
//! in-flight rather than an error.

use serde::Deserialize;

/// Envelope wrapping every provider response body.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Response to starting an actor run.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggeredRun {
    pub id: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: Option<String>,
}

/// A run as reported by the provider's status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub status: String,
    #[serde(rename = "statusMessage")]
    pub status_message: Option<String>,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: Option<String>,
}

impl RunInfo {
    /// The run has finished successfully and a dataset should exist.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }

    /// The run terminated without producing a dataset.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "FAILED" | "ABORTED")
    }

    /// Still in flight. Unknown statuses land here so the next poll tick
    /// decides instead of failing the run early.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.is_succeeded() && !self.is_failed()
    }
}

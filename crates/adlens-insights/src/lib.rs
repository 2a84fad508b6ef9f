//! Advertising-insights API client and metrics engine.
//!
//! Fetches per-ad performance data from the external metrics API and
//! turns its semi-structured responses into [`adlens_core::PerformanceInsight`]
//! snapshots. The hairy parts are all in [`metrics`]: the API reports the
//! same conversion under several overlapping action-type labels (summing
//! them overcounts 2–3×), click counts arrive in four different shapes,
//! and every derived ratio needs a division guard.

pub mod client;
pub mod error;
pub mod metrics;
pub mod sync;
pub mod types;

pub use client::InsightsClient;
pub use error::InsightsError;
pub use sync::{collect_batch, SyncError, SyncOutcome, SyncParams};
pub use types::{ActionEntry, AdRef, InsightRow};

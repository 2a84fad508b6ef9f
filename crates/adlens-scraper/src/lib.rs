pub mod brand_match;
pub mod client;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
mod retry;
pub mod types;

pub use client::ScrapeClient;
pub use error::ScrapeError;
pub use normalize::{normalize_record, NormalizeContext, PLACEHOLDER_THUMBNAIL_URL};
pub use orchestrator::{PollConfig, PollOutcome, RunEvent, RunHandle, StatusPoll, TriggerMode};
pub use types::{RunInfo, TriggeredRun};

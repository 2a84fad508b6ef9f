//! Core domain types and configuration for adlens.
//!
//! Everything here is shared by the scraper, insights, db, and server
//! crates: the canonical [`Ad`] entity produced by normalization, the
//! tracked [`Brand`], the scrape-run status machine, the
//! [`PerformanceInsight`] snapshot, and the env-driven [`AppConfig`].

mod app_config;
mod config;
pub mod brands;
mod types;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use types::{Ad, Brand, PerformanceInsight, ScrapeRunStatus};

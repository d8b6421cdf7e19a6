//! Domain types shared by the scraping engine and its front ends.

pub mod app_config;
pub mod config;
pub mod place;
pub mod request;
pub mod scraper_config;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use place::{Coordinates, PlaceField, PlaceRecord, Tier};
pub use request::{
    ConsentState, JobState, SearchMeta, SearchRequest, SearchResult, DEFAULT_CONCURRENCY,
    MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use scraper_config::ScraperConfig;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("max_places must be a positive integer, got {0}")]
    InvalidMaxPlaces(usize),

    #[error("invalid language code: {0:?}")]
    InvalidLang(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

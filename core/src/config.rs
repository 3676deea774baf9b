use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
pub use config::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    pub path: String,
    pub compact_on_open: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    FailFast,
    Wait,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FetcherConfig {
    pub base_url: String,
    // empty disables citing-works lookups
    pub citations_url: String,
    pub mailto: Option<String>,
    pub timeout_ms: u64,
    pub requests_per_interval: u32,
    pub interval_ms: u64,
    pub rate_limit_policy: RateLimitPolicy,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ExpansionConfig {
    pub default_depth: usize,
    pub fan_out_cap: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AnalyticsConfig {
    pub pagerank_damping: f64,
    pub pagerank_tolerance: f64,
    pub pagerank_max_iterations: usize,
    pub community_seed: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: 0.85,
            pagerank_tolerance: 1e-6,
            pagerank_max_iterations: 100,
            community_seed: 42,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub fetcher: FetcherConfig,
    pub expansion: ExpansionConfig,
    pub analytics: AnalyticsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = with_defaults(Config::builder())?
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join(&run_mode).to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("CITEGRAPH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn defaults() -> Result<Self, ConfigError> {
        let config: Self = with_defaults(Config::builder())?
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetcher.requests_per_interval == 0 {
            return Err(ConfigError::Message(
                "fetcher.requests_per_interval must be positive".into(),
            ));
        }
        if self.fetcher.interval_ms == 0 {
            return Err(ConfigError::Message(
                "fetcher.interval_ms must be positive".into(),
            ));
        }
        if self.fetcher.max_attempts == 0 {
            return Err(ConfigError::Message(
                "fetcher.max_attempts must be positive".into(),
            ));
        }
        let damping = self.analytics.pagerank_damping;
        if !(damping > 0.0 && damping < 1.0) {
            return Err(ConfigError::Message(format!(
                "analytics.pagerank_damping must be in (0, 1), got {damping}"
            )));
        }
        Ok(())
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("store.path", "data/citegraph.wal")?
        .set_default("store.compact_on_open", false)?
        .set_default("fetcher.base_url", "https://api.crossref.org")?
        .set_default(
            "fetcher.citations_url",
            "https://opencitations.net/index/coci/api/v1",
        )?
        .set_default("fetcher.timeout_ms", 10_000_i64)?
        .set_default("fetcher.requests_per_interval", 50_i64)?
        .set_default("fetcher.interval_ms", 1_000_i64)?
        .set_default("fetcher.rate_limit_policy", "fail_fast")?
        .set_default("fetcher.max_attempts", 4_i64)?
        .set_default("fetcher.initial_backoff_ms", 200_i64)?
        .set_default("fetcher.max_backoff_ms", 5_000_i64)?
        .set_default("expansion.default_depth", 1_i64)?
        .set_default("expansion.fan_out_cap", 15_i64)?
        .set_default("analytics.pagerank_damping", 0.85)?
        .set_default("analytics.pagerank_tolerance", 1e-6)?
        .set_default("analytics.pagerank_max_iterations", 100_i64)?
        .set_default("analytics.community_seed", 42_i64)
}

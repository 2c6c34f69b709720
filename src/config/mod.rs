//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `HERMES` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use hermes_indexer::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod broker;
mod consumer;
mod database;
mod error;
mod relay;
mod steps;

pub use broker::BrokerConfig;
pub use consumer::ConsumerConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use relay::RelayConfig;
pub use steps::{ContentConfig, EmbeddingsConfig, SearchConfig, StepsConfig, SummaryConfig};

use serde::Deserialize;

/// Where the operator-owned ruleset document lives.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesetsConfig {
    /// Path to the ruleset YAML file
    #[serde(default = "default_rulesets_path")]
    pub path: String,
}

impl Default for RulesetsConfig {
    fn default() -> Self {
        Self {
            path: default_rulesets_path(),
        }
    }
}

fn default_rulesets_path() -> String {
    "rulesets.yaml".to_string()
}

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment
/// variables.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Broker configuration (partitioned log)
    pub broker: BrokerConfig,

    /// Outbox relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Consumer supervisor configuration
    #[serde(default)]
    pub consumer: ConsumerConfig,

    /// Step backend configuration
    pub steps: StepsConfig,

    /// Ruleset file location
    #[serde(default)]
    pub rulesets: RulesetsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `HERMES` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `HERMES__DATABASE__URL=...` -> `database.url = ...`
    /// - `HERMES__BROKER__TOPIC=...` -> `broker.topic = ...`
    /// - `HERMES__STEPS__SEARCH__ENDPOINT=...` -> `steps.search.endpoint`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("HERMES")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    /// Validation failures are fatal at startup (exit non-zero).
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.broker.validate()?;
        self.relay.validate()?;
        self.consumer.validate()?;
        self.steps.validate()?;
        Ok(())
    }
}

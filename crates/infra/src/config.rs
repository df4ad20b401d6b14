//! Layered configuration: built-in defaults, then an optional file, then
//! `STOCKFLOW__SECTION__KEY` environment variables.

use std::path::Path;

use config::{Config, Environment, File, Source};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stockflow_insights::InsightConfig;
use stockflow_observability::LogConfig;

/// Environment variable naming the config file to load.
pub const CONFIG_PATH_ENV: &str = "STOCKFLOW_CONFIG";

pub const ENV_PREFIX: &str = "STOCKFLOW";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// FIFO-allocate every item when an order is accepted.
    pub reserve_stock_on_accept: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when absent.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockflowConfig {
    pub log: LogConfig,
    pub engine: EngineConfig,
    pub insights: InsightConfig,
    pub database: DatabaseConfig,
}

impl StockflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.insights
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Install the process-wide tracing subscriber from the `log` section.
    pub fn init_logging(&self) {
        stockflow_observability::init(&self.log);
    }
}

/// Load configuration for the process (file from `STOCKFLOW_CONFIG`, if set).
pub fn load() -> Result<StockflowConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).ok();
    load_with(path.as_deref().map(Path::new), ENV_PREFIX)
}

pub fn load_with(file: Option<&Path>, env_prefix: &str) -> Result<StockflowConfig, ConfigError> {
    if let Some(path) = file {
        info!("Loading configuration file {}", path.display());
    }
    assemble(file.map(|p| File::from(p).required(false)), env_prefix)
}

fn assemble<S>(file: Option<S>, env_prefix: &str) -> Result<StockflowConfig, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    let mut builder = Config::builder()
        .set_default("log.level", "info")?
        .set_default("log.format", "json")?
        .set_default("engine.reserve_stock_on_accept", false)?
        .set_default("database.max_connections", 5)?;

    if let Some(file) = file {
        builder = builder.add_source(file);
    }

    let config: StockflowConfig = builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use stockflow_observability::LogFormat;

    // No variables carry this prefix, so only defaults and the file apply.
    const UNSET_PREFIX: &str = "STOCKFLOW_CONFIG_TEST_UNSET";

    fn from_toml(text: &str) -> Result<StockflowConfig, ConfigError> {
        assemble(Some(File::from_str(text, FileFormat::Toml)), UNSET_PREFIX)
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = assemble::<File<config::FileSourceString, FileFormat>>(None, UNSET_PREFIX)
            .unwrap();
        assert_eq!(config, StockflowConfig::default());
        assert!(!config.engine.reserve_stock_on_accept);
        assert_eq!(config.insights.window_days, 30);
    }

    #[test]
    fn file_overrides_defaults() {
        let config = from_toml(
            r#"
            [log]
            level = "debug"
            format = "pretty"

            [engine]
            reserve_stock_on_accept = true

            [insights]
            window_days = 14
            "#,
        )
        .unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert!(config.engine.reserve_stock_on_accept);
        assert_eq!(config.insights.window_days, 14);
        assert_eq!(config.insights.reorder_soon_days, 14);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let err = from_toml(
            r#"
            [insights]
            window_days = 0
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("window_days")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let config = load_with(Some(Path::new("/nonexistent/stockflow.toml")), UNSET_PREFIX).unwrap();
        assert_eq!(config.database.url, None);
    }
}

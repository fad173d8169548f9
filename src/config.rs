//! Environment based configuration of the view lambdas.
//!
//! | Variable         | Default             |
//! |------------------|---------------------|
//! | `LOGLEVEL`       | `INFO`              |
//! | `TABLE_NAME`     | `crc-counter`       |
//! | `COUNTER_ID`     | `1`                 |
//! | `INCREMENT_MODE` | `read-modify-write` |
//!
//! Empty variables are treated like unset ones.

use crate::counter::IncrementMode;
use tracing::level_filters::LevelFilter;

/// Default name of the DynamoDB table holding the counter
pub const DEFAULT_TABLE_NAME: &str = "crc-counter";
/// Default value of the counter's partition key
pub const DEFAULT_COUNTER_ID: &str = "1";

/// Settings read once per execution environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum level of log records being written
    pub log_level: LevelFilter,
    /// DynamoDB table holding the counter record
    pub table_name: String,
    /// Partition key value of the counter record
    pub counter_id: String,
    /// How the increment lambdas advance the counter
    pub increment_mode: IncrementMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            table_name: DEFAULT_TABLE_NAME.into(),
            counter_id: DEFAULT_COUNTER_ID.into(),
            increment_mode: IncrementMode::default(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration using `lookup` to resolve variables
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        use anyhow::Context;

        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let log_level = match lookup("LOGLEVEL") {
            Some(level) => parse_log_level(&level)
                .with_context(|| format!("Invalid LOGLEVEL env variable: {}", level))?,
            None => defaults.log_level,
        };
        let increment_mode = match lookup("INCREMENT_MODE") {
            Some(mode) => mode
                .parse::<IncrementMode>()
                .with_context(|| format!("Invalid INCREMENT_MODE env variable: {}", mode))?,
            None => defaults.increment_mode,
        };
        Ok(Self {
            log_level,
            table_name: lookup("TABLE_NAME").unwrap_or(defaults.table_name),
            counter_id: lookup("COUNTER_ID").unwrap_or(defaults.counter_id),
            increment_mode,
        })
    }
}

/// Accepts the usual level names, including `WARNING` and `CRITICAL`
fn parse_log_level(level: &str) -> anyhow::Result<LevelFilter> {
    let level = level.trim().to_ascii_uppercase();
    Ok(match level.as_str() {
        "OFF" => LevelFilter::OFF,
        "TRACE" => LevelFilter::TRACE,
        "DEBUG" => LevelFilter::DEBUG,
        "INFO" => LevelFilter::INFO,
        "WARN" | "WARNING" => LevelFilter::WARN,
        "ERROR" | "CRITICAL" => LevelFilter::ERROR,
        _ => anyhow::bail!("Unknown log level: {}", level),
    })
}

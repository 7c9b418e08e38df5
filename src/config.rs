use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::db::PoolSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} must be a valid number, got '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub pool: PoolSettings,
}

impl Config {
    /// Reads `DATABASE_URL`, `DB_POOL_MAX_SIZE`, `DB_CONNECTION_TIMEOUT_SECS`
    /// and `DB_STATEMENT_TIMEOUT_MS` (0 disables the timeout).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let defaults = PoolSettings::default();

        let max_size = parse_or(&lookup, "DB_POOL_MAX_SIZE", defaults.max_size)?;
        let connection_timeout_secs = parse_or(
            &lookup,
            "DB_CONNECTION_TIMEOUT_SECS",
            defaults.connection_timeout.as_secs(),
        )?;
        let statement_timeout_ms: u64 = parse_or(&lookup, "DB_STATEMENT_TIMEOUT_MS", 0)?;

        Ok(Config {
            database_url,
            pool: PoolSettings {
                max_size,
                connection_timeout: Duration::from_secs(connection_timeout_secs),
                statement_timeout: (statement_timeout_ms > 0)
                    .then(|| Duration::from_millis(statement_timeout_ms)),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

//! Server configuration, loaded once at startup and handed to each manager.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working local setup. The database password may be supplied through the
//! `ZEROSUM_DB_PASSWORD` environment variable instead of the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};
use crate::progression::LEADERBOARD_MIN_GAMES;

/// Address value that selects the in-process storage engine.
pub const IN_MEMORY_ADDRESS: &str = "memory";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the admin websocket listens.
    pub listen_address: String,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub settlement: SettlementConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:6379".into(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            settlement: SettlementConfig::default(),
        }
    }
}

impl Config {
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        if let Ok(password) = std::env::var("ZEROSUM_DB_PASSWORD") {
            config.database.password = password;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.settlement.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "settlement.timeout_secs",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.settlement.close_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "settlement.close_poll_interval_secs",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.database.address.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.address",
                reason: "must not be empty".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Websocket address of the database, or `"memory"`.
    pub address: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            address: IN_MEMORY_ADDRESS.into(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.address == IN_MEMORY_ADDRESS
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".into(),
            namespace: "zerosum".into(),
            database: "zerosum".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Installs the global tracing subscriber. `RUST_LOG` wins over `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub timeout_secs: u64,
    pub close_poll_interval_secs: u64,
    pub leaderboard_min_games: u32,
}

impl SettlementConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn close_poll_interval(&self) -> Duration {
        Duration::from_secs(self.close_poll_interval_secs)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            close_poll_interval_secs: 60,
            leaderboard_min_games: LEADERBOARD_MIN_GAMES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:6379");
        assert_eq!(config.database.namespace, "zerosum");
        assert_eq!(config.settlement.timeout(), Duration::from_secs(30));
        assert_eq!(config.settlement.leaderboard_min_games, 9);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse_toml(
            r#"
            listen_address = "0.0.0.0:9000"

            [database]
            address = "memory"

            [settlement]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_address, "0.0.0.0:9000");
        assert!(config.database.is_in_memory());
        assert_eq!(config.database.database, "zerosum");
        assert_eq!(config.settlement.timeout_secs, 5);
        assert_eq!(config.settlement.close_poll_interval_secs, 60);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::parse_toml("[settlement]\ntimeout_secs = 0").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "settlement.timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::parse_toml("listen_address = ").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }
}

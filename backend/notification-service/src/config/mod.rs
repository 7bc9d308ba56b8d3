use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub stream: StreamConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

/// Where notifications are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local, for development and tests
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Lifetime ceiling of one stream connection (default: 1 hour)
    pub connection_ttl_secs: u64,
    /// Upper bound for writing a single frame (default: 5s)
    pub write_timeout_ms: u64,
    /// Frames buffered per connection before writes start waiting
    pub channel_capacity: usize,
    /// Keep-alive comment interval (default: 30s)
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Number of entries returned by the recent listing
    pub recent_limit: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("NOTIFICATION_STORE").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "NOTIFICATION_STORE must be 'postgres' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("plain") => LogFormat::Plain,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "LOG_FORMAT must be 'plain' or 'json', got '{}'",
                    other
                )))
            }
        };

        let database_url = match (store, lookup("DATABASE_URL")) {
            (_, Some(url)) => url,
            (StoreBackend::Memory, None) => String::new(),
            (StoreBackend::Postgres, None) => {
                return Err(AppError::Config("DATABASE_URL missing".into()))
            }
        };

        let config = Config {
            app: AppConfig {
                env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
                port: parse_or(&lookup, "APP_PORT", 8000)?,
                shutdown_timeout_secs: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30)?,
                log_format,
            },
            store,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", 2)?,
                acquire_timeout_secs: parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 10)?,
            },
            stream: StreamConfig {
                connection_ttl_secs: parse_or(&lookup, "STREAM_CONNECTION_TTL_SECS", 60 * 60)?,
                write_timeout_ms: parse_or(&lookup, "STREAM_WRITE_TIMEOUT_MS", 5_000)?,
                channel_capacity: parse_or(&lookup, "STREAM_CHANNEL_CAPACITY", 32)?,
                keep_alive_secs: parse_or(&lookup, "STREAM_KEEP_ALIVE_SECS", 30)?,
            },
            notifications: NotificationsConfig {
                recent_limit: parse_or(&lookup, "NOTIFICATION_RECENT_LIMIT", 50)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        let positive = [
            ("STREAM_CONNECTION_TTL_SECS", self.stream.connection_ttl_secs),
            ("STREAM_WRITE_TIMEOUT_MS", self.stream.write_timeout_ms),
            ("STREAM_CHANNEL_CAPACITY", self.stream.channel_capacity as u64),
            ("STREAM_KEEP_ALIVE_SECS", self.stream.keep_alive_secs),
            ("DATABASE_MAX_CONNECTIONS", u64::from(self.database.max_connections)),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than zero", key)));
            }
        }

        if self.notifications.recent_limit <= 0 {
            return Err(AppError::Config(
                "NOTIFICATION_RECENT_LIMIT must be greater than zero".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::Config(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS".into(),
            ));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} is invalid: {}", key, e))),
        None => Ok(default),
    }
}

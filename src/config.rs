//! Configuration management for inflight.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with tracker limits and named database connections.

use crate::db::{strip_creds, ConnectOptions};
use crate::error::{InflightError, Result};
use crate::query::ExecutionOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main configuration structure for inflight.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Tracker limits and timing.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// Tracker limits and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Interval between snapshot sets sent to streaming consumers.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Upper bound on a single query; unlimited when absent.
    #[serde(default)]
    pub max_execution_secs: Option<u64>,

    /// Rows materialized per query.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// How long to wait for a backend connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_max_rows() -> usize {
    crate::query::DEFAULT_MAX_ROWS
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_execution_secs: None,
            max_rows: default_max_rows(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl TrackerConfig {
    /// Snapshot tick interval (never zero).
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Limits handed to the executor.
    ///
    /// Settings that bypassed [`validate`](Self::validate) are clamped: a zero
    /// execution limit means no limit and at least one row is materialized.
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            max_execution_time: self
                .max_execution_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            max_rows: self.max_rows.max(1),
        }
    }

    /// Settings handed to the backend connector.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    /// Rejects settings that cannot describe a working tracker. Run again
    /// after command-line overrides are applied.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(InflightError::config("tracker.tick_interval_ms must be positive"));
        }
        if self.max_rows == 0 {
            return Err(InflightError::config(
                "tracker.max_rows must be positive; the first row is always kept",
            ));
        }
        if self.max_execution_secs == Some(0) {
            return Err(InflightError::config(
                "tracker.max_execution_secs must be positive; omit it for no limit",
            ));
        }
        Ok(())
    }
}

/// Database connection configuration.
///
/// Either a full `url`, or PostgreSQL parts assembled into one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// Complete connection target (`postgres://...`, `sqlite:...`).
    pub url: Option<String>,

    /// Database host.
    pub host: Option<String>,

    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: Option<String>,

    /// Database user.
    pub user: Option<String>,

    /// Database password (not recommended to store in config).
    pub password: Option<String>,
}

fn default_port() -> u16 {
    5432
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_port(),
            database: None,
            user: None,
            password: None,
        }
    }
}

impl ConnectionConfig {
    /// Creates a new connection config from a connection string.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let url = Url::parse(conn_str)
            .map_err(|e| InflightError::config(format!("Invalid connection string: {e}")))?;

        match url.scheme() {
            "postgres" | "postgresql" | "sqlite" => Ok(Self {
                url: Some(conn_str.to_string()),
                port: url.port().unwrap_or(default_port()),
                ..Default::default()
            }),
            other => Err(InflightError::config(format!(
                "Invalid scheme '{other}'. Expected 'postgres', 'postgresql' or 'sqlite'"
            ))),
        }
    }

    /// Converts the connection config to a connection target.
    pub fn to_connection_string(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let host = self.host.as_deref().unwrap_or("localhost");
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| InflightError::config("Database name is required"))?;

        let mut conn_str = String::from("postgres://");

        if let Some(user) = &self.user {
            conn_str.push_str(user);
            if let Some(password) = &self.password {
                conn_str.push(':');
                conn_str.push_str(password);
            }
            conn_str.push('@');
        }

        conn_str.push_str(host);
        conn_str.push(':');
        conn_str.push_str(&self.port.to_string());
        conn_str.push('/');
        conn_str.push_str(database);

        Ok(conn_str)
    }

    /// Applies environment variables (PGHOST, PGPORT, etc.) as defaults.
    ///
    /// Ignored when a full url is configured.
    pub fn apply_env_defaults(&mut self) {
        if self.url.is_some() {
            return;
        }
        if self.host.is_none() {
            self.host = std::env::var("PGHOST").ok();
        }
        if self.port == default_port() {
            if let Ok(port_str) = std::env::var("PGPORT") {
                if let Ok(port) = port_str.parse() {
                    self.port = port;
                }
            }
        }
        if self.database.is_none() {
            self.database = std::env::var("PGDATABASE").ok();
        }
        if self.user.is_none() {
            self.user = std::env::var("PGUSER").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("PGPASSWORD").ok();
        }
    }

    /// Returns a display-safe string (no credentials).
    pub fn display_string(&self) -> String {
        if let Some(url) = &self.url {
            return strip_creds(url);
        }
        let host = self.host.as_deref().unwrap_or("localhost");
        let database = self.database.as_deref().unwrap_or("unknown");
        format!("{database} @ {host}:{}", self.port)
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("inflight")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| InflightError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            InflightError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.tracker.validate()?;
        Ok(config)
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}

//! Database abstraction layer for inflight.
//!
//! Provides a trait-based interface for opening a connection from a target
//! string and running a single statement on it, allowing different backends
//! (and the in-process mock) to be used interchangeably by the executor.

mod mock;
mod postgres;
mod sqlite;
mod types;

pub use mock::{MockConnector, MockDatabaseClient};
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Record, Row, Value};

use crate::error::{InflightError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Determines the backend from a connection target.
    pub fn from_target(target: &str) -> Result<Self> {
        let scheme = target_scheme(target)?;
        Self::parse(&scheme).ok_or_else(|| {
            InflightError::submission(format!(
                "Unsupported scheme '{scheme}'. Expected 'postgres', 'postgresql' or 'sqlite'"
            ))
        })
    }
}

/// Returns the URL scheme of a connection target.
pub fn target_scheme(target: &str) -> Result<String> {
    let url = Url::parse(target)
        .map_err(|e| InflightError::submission(format!("Invalid connection target: {e}")))?;
    Ok(url.scheme().to_string())
}

/// Removes embedded credentials from a connection target.
///
/// Everything up to and including the last `@` is discarded; a target
/// without `@` is returned whole.
pub fn strip_creds(target: &str) -> String {
    match target.rfind('@') {
        Some(at) => target[at + 1..].to_string(),
        None => target.to_string(),
    }
}

/// Backend-independent connection settings.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// How long to wait for the connection to be established.
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A single open backend connection owned by one running query.
///
/// All database operations are async and return Results with InflightError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a SQL statement, materializing at most `max_rows` rows while
    /// still counting every row the backend returns.
    async fn execute_query(&self, sql: &str, max_rows: usize) -> Result<QueryResult>;

    /// Closes the connection.
    async fn close(&self) -> Result<()>;
}

/// Opens backend connections from connection targets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Checks that a target is usable by this connector without connecting.
    fn validate_target(&self, target: &str) -> Result<()>;

    /// Opens a connection to `target`.
    async fn connect(&self, target: &str) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector for the sqlx-backed drivers, selected by target scheme.
#[derive(Debug, Clone, Default)]
pub struct SqlxConnector {
    options: ConnectOptions,
}

impl SqlxConnector {
    /// Creates a connector with the given connection settings.
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    fn validate_target(&self, target: &str) -> Result<()> {
        DatabaseBackend::from_target(target).map(|_| ())
    }

    async fn connect(&self, target: &str) -> Result<Box<dyn DatabaseClient>> {
        let backend = DatabaseBackend::from_target(target)
            .map_err(|e| InflightError::connection(e.to_string()))?;
        debug!("Opening {} connection to {}", backend.as_str(), strip_creds(target));
        match backend {
            DatabaseBackend::Postgres => {
                let client = PostgresClient::connect(target, &self.options).await?;
                Ok(Box::new(client))
            }
            DatabaseBackend::Sqlite => {
                let client = SqliteClient::connect(target, &self.options).await?;
                Ok(Box::new(client))
            }
        }
    }
}

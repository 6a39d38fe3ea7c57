//! Mock connector and client for testing.
//!
//! Provides an in-process backend whose behavior is scripted by the target
//! and the statement text, so tracker behavior (slow statements, failures,
//! unreachable hosts) can be exercised without a database server.
//!
//! Targets use the `mock` scheme and accept two query parameters:
//! `connect_delay_ms=N` delays the connection, `unreachable=true` makes it
//! fail. Statements:
//!
//! - `SLEEP <ms>`: waits, then returns one row `{slept_ms: <ms>}`
//! - `ROWS <n>`: returns `n` rows with columns `id` and `name`
//! - `FAIL <message>`: fails with an execution error
//! - any other `SELECT`: returns one `result` row
//! - anything else: returns no rows

use super::{ColumnInfo, Connector, DatabaseClient, QueryResult, Value};
use crate::error::{InflightError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Connector producing [`MockDatabaseClient`]s.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    open: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl MockConnector {
    /// Creates a new mock connector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Number of connections opened over the connector's lifetime.
    pub fn total_connections(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn validate_target(&self, target: &str) -> Result<()> {
        let url = Url::parse(target)
            .map_err(|e| InflightError::submission(format!("Invalid connection target: {e}")))?;
        if url.scheme() != "mock" {
            return Err(InflightError::submission(format!(
                "Unsupported scheme '{}'. Expected 'mock'",
                url.scheme()
            )));
        }
        Ok(())
    }

    async fn connect(&self, target: &str) -> Result<Box<dyn DatabaseClient>> {
        let url = Url::parse(target).map_err(|e| InflightError::connection(e.to_string()))?;

        let mut delay = Duration::ZERO;
        let mut unreachable = false;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_delay_ms" => {
                    delay = Duration::from_millis(value.parse().unwrap_or(0));
                }
                "unreachable" => unreachable = value == "true",
                _ => {}
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            let host = url.host_str().unwrap_or("localhost");
            return Err(InflightError::connection(format!(
                "Cannot connect to {host}. Check that the server is running."
            )));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient::new(Arc::clone(&self.open))))
    }
}

/// A mock database client that returns scripted results.
///
/// Counts itself as open until dropped.
#[derive(Debug)]
pub struct MockDatabaseClient {
    open: Arc<AtomicUsize>,
}

impl MockDatabaseClient {
    fn new(open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { open }
    }
}

impl Drop for MockDatabaseClient {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

fn parse_arg<T: std::str::FromStr>(arg: &str, sql: &str) -> Result<T> {
    arg.trim()
        .parse()
        .map_err(|_| InflightError::execution(format!("syntax error in mock statement: {sql}")))
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let trimmed = sql.trim();
        let (verb, arg) = trimmed.split_once(' ').unwrap_or((trimmed, ""));

        let (columns, rows) = match verb.to_uppercase().as_str() {
            "SLEEP" => {
                let ms: u64 = parse_arg(arg, sql)?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                (
                    vec![ColumnInfo::new("slept_ms", "integer")],
                    vec![vec![Value::Int(ms as i64)]],
                )
            }
            "ROWS" => {
                let n: i64 = parse_arg(arg, sql)?;
                (
                    vec![
                        ColumnInfo::new("id", "integer"),
                        ColumnInfo::new("name", "text"),
                    ],
                    (1..=n)
                        .map(|i| vec![Value::Int(i), Value::String(format!("row-{i}"))])
                        .collect(),
                )
            }
            "FAIL" => return Err(InflightError::execution(arg.trim().to_string())),
            "SELECT" => (
                vec![ColumnInfo::new("result", "text")],
                vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            ),
            _ => (vec![], vec![]),
        };

        let total_rows = rows.len();
        let rows: Vec<_> = rows.into_iter().take(max_rows).collect();
        let row_count = rows.len();
        Ok(QueryResult {
            columns,
            rows,
            execution_time: Duration::from_millis(1),
            row_count,
            total_rows,
            was_truncated: total_rows > row_count,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

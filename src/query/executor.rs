//! Background execution of submitted queries.
//!
//! Each query runs in its own tokio task: connect, bind a cancellation
//! token, race the statement against that token and the optional deadline,
//! then record the outcome if the query is still running.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::{Connector, DatabaseClient, QueryResult};
use crate::error::{InflightError, Result};
use crate::query::state::{CancelOutcome, Query};

/// Default number of rows materialized per query.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Limits applied to every execution.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOptions {
    /// Upper bound on the backend call; `None` lets a query run until it
    /// completes, fails or is canceled.
    pub max_execution_time: Option<Duration>,
    /// Rows materialized per query; further rows are only counted.
    pub max_rows: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_execution_time: None,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// Launches query executions against a connector.
#[derive(Clone)]
pub struct Executor {
    connector: Arc<dyn Connector>,
    options: ExecutionOptions,
}

impl Executor {
    /// Creates an executor.
    pub fn new(connector: Arc<dyn Connector>, options: ExecutionOptions) -> Self {
        Self { connector, options }
    }

    /// Checks a target with the connector without connecting.
    pub fn validate_target(&self, target: &str) -> Result<()> {
        self.connector.validate_target(target)
    }

    /// Spawns the execution of `query` against `target`.
    ///
    /// The raw target (credentials included) is owned by the task only. The
    /// execution's token is a child of `parent`, so cancelling the parent
    /// cancels every execution launched from it.
    pub fn launch(
        &self,
        query: Arc<Query>,
        target: String,
        parent: &CancellationToken,
    ) -> JoinHandle<()> {
        let connector = Arc::clone(&self.connector);
        let options = self.options;
        let token = parent.child_token();
        tokio::spawn(async move { run(connector, options, query, target, token).await })
    }
}

async fn run(
    connector: Arc<dyn Connector>,
    options: ExecutionOptions,
    query: Arc<Query>,
    target: String,
    token: CancellationToken,
) {
    let id = query.id();

    let connected = tokio::select! {
        biased;

        _ = token.cancelled() => {
            mark_canceled(&query);
            return;
        }
        result = connector.connect(&target) => result,
    };

    let client = match connected {
        Ok(client) => client,
        Err(e) => {
            warn!("Query {} could not connect to {}: {}", id, query.target(), e);
            query.complete(Err(e), Instant::now());
            return;
        }
    };

    if query.attach_cancel(token.clone()) {
        debug!("Query {} connected to {}", id, query.target());
        let outcome = tokio::select! {
            biased;

            _ = token.cancelled() => None,
            result = execute(client.as_ref(), query.sql(), &options) => Some(result),
        };

        match outcome {
            None => mark_canceled(&query),
            Some(result) => {
                let backend_time = result.as_ref().ok().map(|r| r.execution_time);
                if query.complete(result, Instant::now()) {
                    match backend_time {
                        Some(elapsed) => info!("Query {} succeeded in {:?}", id, elapsed),
                        None => info!("Query {} failed", id),
                    }
                } else {
                    debug!("Query {} finished after cancellation; outcome discarded", id);
                }
            }
        }
    } else {
        debug!("Query {} canceled while connecting", id);
    }

    if let Err(e) = client.close().await {
        warn!("Query {} failed to close its connection: {}", id, e);
    }
}

/// Runs the statement, bounded by the configured deadline.
async fn execute(
    client: &dyn DatabaseClient,
    sql: &str,
    options: &ExecutionOptions,
) -> Result<QueryResult> {
    // The first row is always kept for the summary.
    let max_rows = options.max_rows.max(1);
    match options.max_execution_time.filter(|limit| !limit.is_zero()) {
        Some(limit) => tokio::time::timeout(limit, client.execute_query(sql, max_rows))
            .await
            .map_err(|_| {
                InflightError::execution(format!(
                    "Query exceeded the maximum execution time of {limit:?}"
                ))
            })?,
        None => client.execute_query(sql, max_rows).await,
    }
}

/// Marks a query canceled after its token fired. A prior explicit cancel
/// already did this; a shutdown of the parent token did not.
fn mark_canceled(query: &Query) {
    if query.cancel(Instant::now()) == CancelOutcome::Canceled {
        info!("Query {} canceled by shutdown", query.id());
    }
}

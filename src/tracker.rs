//! The tracker facade.
//!
//! `Tracker` is the narrow interface the presentation layer calls into:
//! submit, cancel, list and subscribe. It owns the registry, the executor
//! and the root cancellation token every execution derives from, and is
//! meant to be constructed once and shared (`Arc<Tracker>`) by all handlers.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::TrackerConfig;
use crate::db::{Connector, SqlxConnector};
use crate::error::{InflightError, Result};
use crate::query::{
    CancelOutcome, ExecutionOptions, Executor, QueryId, QuerySnapshot, Registry,
    SnapshotPublisher, SnapshotSet, DEFAULT_TICK_INTERVAL,
};

/// A request to run one statement against one target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitRequest {
    pub sql: String,
    /// Connection target, credentials included.
    #[serde(alias = "db")]
    pub target: String,
}

impl SubmitRequest {
    pub fn new(sql: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            target: target.into(),
        }
    }

    /// Binds a JSON request body.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| InflightError::submission(format!("Unable to parse request: {e}")))
    }

    fn validate(&self) -> Result<()> {
        if self.sql.trim().is_empty() {
            return Err(InflightError::submission("SQL must not be empty"));
        }
        if self.target.trim().is_empty() {
            return Err(InflightError::submission("Connection target must not be empty"));
        }
        Ok(())
    }
}

/// Registry of in-flight and completed queries.
pub struct Tracker {
    registry: Arc<Registry>,
    executor: Executor,
    root: CancellationToken,
    tick_interval: Duration,
}

impl Tracker {
    /// Creates a tracker over the given connector.
    pub fn new(connector: Arc<dyn Connector>, config: &TrackerConfig) -> Self {
        Self::with_registry(
            Arc::new(Registry::new()),
            connector,
            config.execution_options(),
            config.tick_interval(),
        )
    }

    /// Creates a tracker backed by the sqlx drivers.
    pub fn with_sqlx(config: &TrackerConfig) -> Self {
        let connector = SqlxConnector::new(config.connect_options());
        Self::new(Arc::new(connector), config)
    }

    /// Creates a tracker from explicit parts.
    pub fn with_registry(
        registry: Arc<Registry>,
        connector: Arc<dyn Connector>,
        options: ExecutionOptions,
        tick_interval: Duration,
    ) -> Self {
        let tick_interval = if tick_interval.is_zero() {
            DEFAULT_TICK_INTERVAL
        } else {
            tick_interval
        };
        Self {
            registry,
            executor: Executor::new(connector, options),
            root: CancellationToken::new(),
            tick_interval,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Validates the request, registers a running query and launches it.
    ///
    /// Returns as soon as the execution task is spawned. Must be called from
    /// within a tokio runtime.
    pub fn submit(&self, request: SubmitRequest) -> Result<QueryId> {
        request.validate()?;
        self.executor.validate_target(&request.target)?;
        if self.root.is_cancelled() {
            return Err(InflightError::submission("Tracker is shut down"));
        }

        let query = self
            .registry
            .register(&request.sql, &request.target, Instant::now())?;
        let id = query.id();
        info!("Query {} submitted against {}", id, query.target());

        self.executor.launch(query, request.target, &self.root);
        Ok(id)
    }

    /// Cancels query `id` as of instant `at`.
    ///
    /// Unknown ids fail with `NotFound`; terminal queries are left untouched
    /// and reported as `AlreadyTerminal`.
    pub fn cancel(&self, id: QueryId, at: Instant) -> Result<CancelOutcome> {
        let query = self.registry.find(id)?;
        let outcome = query.cancel(at);
        match outcome {
            CancelOutcome::Canceled => info!("Query {} canceled", id),
            CancelOutcome::AlreadyTerminal(status) => {
                info!("Query {} already {}; cancel ignored", id, status)
            }
        }
        Ok(outcome)
    }

    /// Cancels query `id` now.
    pub fn cancel_now(&self, id: QueryId) -> Result<CancelOutcome> {
        self.cancel(id, Instant::now())
    }

    /// Snapshot of every query in submission order, with running durations refreshed.
    pub fn list_snapshot(&self) -> Vec<QuerySnapshot> {
        self.registry.snapshot(Instant::now())
    }

    /// Snapshot of a single query.
    pub fn get(&self, id: QueryId) -> Option<QuerySnapshot> {
        self.registry.get(id).map(|q| q.snapshot(Instant::now()))
    }

    /// A publisher over this tracker's registry, for sink-driven streaming.
    pub fn publisher(&self) -> SnapshotPublisher {
        SnapshotPublisher::new(Arc::clone(&self.registry), self.tick_interval)
    }

    /// A lazy, infinite stream of snapshot sets, one per tick. Drop it to
    /// disconnect.
    pub fn subscribe(&self) -> impl Stream<Item = SnapshotSet> + Send + 'static {
        self.publisher().into_stream()
    }

    /// Cancels every in-flight execution and refuses further submissions.
    pub fn shutdown(&self) {
        info!("Tracker shutting down; {} queries running", self.registry.running());
        self.root.cancel();
    }

    /// A token that fires when the tracker shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.clone()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

//! The per-query state machine.
//!
//! A [`Query`] starts `Running` and moves exactly once to `Success`, `Error`
//! or `Canceled`. Every mutable field lives behind the query's own lock, and
//! every transition re-checks that the query is still running while holding
//! it, so whichever of completion and cancellation locks first wins.

use crate::db::{strip_creds, QueryResult};
use crate::error::InflightError;
use crate::query::id::QueryId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle status of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Running,
    Success,
    Canceled,
    Error,
}

impl QueryStatus {
    /// Returns true for `Success`, `Error` and `Canceled`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Canceled => "canceled",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a cancel request on an existing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The query was running and is now canceled.
    Canceled,
    /// The query had already reached the given terminal status; nothing changed.
    AlreadyTerminal(QueryStatus),
}

/// A consistent, read-only copy of a query's observable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub id: QueryId,
    /// Connection target with credentials stripped.
    pub target: String,
    pub sql: String,
    pub status: QueryStatus,
    pub results: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

#[derive(Debug)]
struct QueryState {
    status: QueryStatus,
    results: Option<String>,
    error: Option<InflightError>,
    duration: Duration,
    cancel: Option<CancellationToken>,
}

/// A single submitted statement and its execution lifecycle.
#[derive(Debug)]
pub struct Query {
    id: QueryId,
    sql: String,
    target: String,
    started_at: DateTime<Utc>,
    started: Instant,
    state: Mutex<QueryState>,
}

impl Query {
    /// Creates a running query. Only the credential-free form of `target` is kept.
    pub fn new(id: QueryId, sql: impl Into<String>, target: &str, started: Instant) -> Self {
        Self {
            id,
            sql: sql.into(),
            target: strip_creds(target),
            started_at: Utc::now(),
            started,
            state: Mutex::new(QueryState {
                status: QueryStatus::Running,
                results: None,
                error: None,
                duration: Duration::ZERO,
                cancel: None,
            }),
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Connection target with credentials stripped.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> QueryStatus {
        self.state.lock().status
    }

    /// Refreshes the duration and copies the observable state in one critical section.
    pub fn snapshot(&self, now: Instant) -> QuerySnapshot {
        let mut state = self.state.lock();
        if state.status == QueryStatus::Running {
            state.duration = now.saturating_duration_since(self.started);
        }
        QuerySnapshot {
            id: self.id,
            target: self.target.clone(),
            sql: self.sql.clone(),
            status: state.status,
            results: state.results.clone(),
            error: state.error.as_ref().map(|e| e.to_string()),
            started_at: self.started_at,
            duration: state.duration,
        }
    }

    /// Binds the cancellation handle of the running execution.
    ///
    /// Returns false (and stores nothing) if the query is no longer running.
    pub fn attach_cancel(&self, token: CancellationToken) -> bool {
        let mut state = self.state.lock();
        if state.status != QueryStatus::Running {
            return false;
        }
        state.cancel = Some(token);
        true
    }

    /// Records the outcome of the backend call.
    ///
    /// Returns false if the query had already reached a terminal status, in
    /// which case the outcome is discarded.
    pub fn complete(&self, outcome: crate::error::Result<QueryResult>, now: Instant) -> bool {
        let mut state = self.state.lock();
        if state.status != QueryStatus::Running {
            return false;
        }
        state.duration = now.saturating_duration_since(self.started);
        state.cancel = None;
        match outcome {
            Ok(result) => {
                state.status = QueryStatus::Success;
                state.results = Some(result.summary());
            }
            Err(error) => {
                state.status = QueryStatus::Error;
                state.error = Some(error);
            }
        }
        true
    }

    /// Cancels the query at instant `at`.
    ///
    /// Fixes the duration, marks the query canceled and signals the bound
    /// execution, if one is attached yet. Never waits for the backend.
    pub fn cancel(&self, at: Instant) -> CancelOutcome {
        let mut state = self.state.lock();
        if state.status != QueryStatus::Running {
            return CancelOutcome::AlreadyTerminal(state.status);
        }
        state.duration = at.saturating_duration_since(self.started);
        state.status = QueryStatus::Canceled;
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
        CancelOutcome::Canceled
    }
}

/// Serde support for durations as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

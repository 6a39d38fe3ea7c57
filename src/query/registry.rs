//! The process-wide collection of submitted queries.

use crate::error::{InflightError, Result};
use crate::query::id::{IdAllocator, QueryId};
use crate::query::state::{Query, QuerySnapshot, QueryStatus};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;

/// Append-only, insertion-ordered registry of every query submitted in this
/// process.
///
/// Identifiers are allocated under the same write lock that appends the
/// query, so the sequence is always sorted by id.
#[derive(Debug, Default)]
pub struct Registry {
    ids: IdAllocator,
    queries: RwLock<Vec<Arc<Query>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with a custom identifier allocator.
    pub fn with_allocator(ids: IdAllocator) -> Self {
        Self {
            ids,
            queries: RwLock::new(Vec::new()),
        }
    }

    /// Allocates an id, creates a running query and appends it.
    pub fn register(&self, sql: &str, target: &str, now: Instant) -> Result<Arc<Query>> {
        let mut queries = self.queries.write();
        let id = self.ids.next()?;
        let query = Arc::new(Query::new(id, sql, target, now));
        queries.push(Arc::clone(&query));
        Ok(query)
    }

    /// Looks a query up by id.
    pub fn get(&self, id: QueryId) -> Option<Arc<Query>> {
        let queries = self.queries.read();
        queries
            .binary_search_by_key(&id, |q| q.id())
            .ok()
            .map(|i| Arc::clone(&queries[i]))
    }

    /// Looks a query up by id, failing with `NotFound` for unknown ids.
    pub fn find(&self, id: QueryId) -> Result<Arc<Query>> {
        self.get(id)
            .ok_or_else(|| InflightError::NotFound(id.as_u16()))
    }

    /// Returns shared handles to every query, in submission order.
    pub fn queries(&self) -> Vec<Arc<Query>> {
        self.queries.read().clone()
    }

    /// Returns a snapshot of every query, refreshing running durations first.
    ///
    /// The registry lock is released before any query lock is taken.
    pub fn snapshot(&self, now: Instant) -> Vec<QuerySnapshot> {
        self.queries()
            .iter()
            .map(|query| query.snapshot(now))
            .collect()
    }

    /// Number of queries that are still running.
    pub fn running(&self) -> usize {
        self.queries()
            .iter()
            .filter(|q| q.status() == QueryStatus::Running)
            .count()
    }

    pub fn len(&self) -> usize {
        self.queries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.read().is_empty()
    }
}

//! Query identifiers and their allocator.

use crate::error::{InflightError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier of a submitted query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(u16);

impl QueryId {
    /// Wraps a raw identifier.
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the inner u16 value.
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for QueryId {
    type Err = InflightError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim_start_matches('#')
            .parse()
            .map(Self)
            .map_err(|_| InflightError::submission(format!("Invalid query id: {s}")))
    }
}

/// Issues strictly increasing identifiers starting at 1.
///
/// The identifier space is never reused: once `u16::MAX` has been handed out,
/// every further call fails.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    /// Creates an allocator whose first identifier is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an allocator whose first identifier is `first`.
    pub fn starting_at(first: u16) -> Self {
        Self {
            next: AtomicU32::new(first as u32),
        }
    }

    /// Returns the next identifier.
    pub fn next(&self) -> Result<QueryId> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n <= u16::MAX as u32).then_some(n + 1)
            })
            .map(|n| QueryId(n as u16))
            .map_err(|_| InflightError::submission("Query identifier space exhausted"))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

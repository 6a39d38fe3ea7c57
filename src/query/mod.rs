//! Query tracking for inflight.
//!
//! This module holds the pieces the tracker is built from: identifier
//! allocation, the per-query state machine, the registry, background
//! execution and snapshot publishing.

pub mod executor;
pub mod id;
pub mod publisher;
pub mod registry;
pub mod state;

pub use executor::{ExecutionOptions, Executor, DEFAULT_MAX_ROWS};
pub use id::{IdAllocator, QueryId};
pub use publisher::{SnapshotPublisher, SnapshotSet, DEFAULT_TICK_INTERVAL};
pub use registry::Registry;
pub use state::{CancelOutcome, Query, QuerySnapshot, QueryStatus};

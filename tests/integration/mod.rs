//! Integration tests for inflight.

pub mod postgres_test;
pub mod sqlite_test;
pub mod tracker_test;

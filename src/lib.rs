//! inflight - a concurrent, cancellable tracker for in-flight database queries.
//!
//! Queries are submitted to a [`tracker::Tracker`], run in the background
//! against a connection target, and can be canceled, listed or streamed as
//! periodic snapshots while they run.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;
pub mod tracker;

//! Error types for inflight.
//!
//! Defines the main error enum used throughout the tracker. Connection and
//! execution errors are recorded on the query they belong to; only
//! submission, lookup and configuration errors reach the caller directly.

use thiserror::Error;

/// Main error type for inflight operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InflightError {
    /// Malformed submission (empty SQL, unusable target, exhausted ids).
    /// The request never enters the registry.
    #[error("Submission error: {0}")]
    Submission(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, constraint violations, timeouts, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Lookup of a query id that was never issued.
    #[error("Query #{0} not found")]
    NotFound(u16),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot encoding errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl InflightError {
    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }


    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "Submission Error",
            Self::Connection(_) => "Connection Error",
            Self::Execution(_) => "Execution Error",
            Self::NotFound(_) => "Not Found",
            Self::Config(_) => "Configuration Error",
            Self::Serialization(_) => "Serialization Error",
        }
    }
}

impl From<serde_json::Error> for InflightError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type alias using InflightError.
pub type Result<T> = std::result::Result<T, InflightError>;

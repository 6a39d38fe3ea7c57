//! Tracker tests against real SQLite databases.

use std::time::Duration;

use inflight::config::TrackerConfig;
use inflight::error::InflightError;
use inflight::query::{QuerySnapshot, QueryStatus};
use inflight::tracker::{SubmitRequest, Tracker};

/// Polls until query `id` leaves Running, for at most five seconds.
async fn wait_for_terminal(tracker: &Tracker, id: inflight::query::QueryId) -> QuerySnapshot {
    for _ in 0..500 {
        let snapshot = tracker.get(id).unwrap();
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("query {id} did not finish");
}

/// Scenario: Running a query against an in-memory database
/// Given a statement returning three rows
/// When it runs through the sqlx backend
/// Then the summary counts the rows and shows the first one
#[tokio::test]
async fn test_sqlite_query_summary() {
    let tracker = Tracker::with_sqlx(&TrackerConfig::default());

    let id = tracker
        .submit(SubmitRequest::new(
            "SELECT 1 AS id, 'Alice' AS name \
             UNION ALL SELECT 2, 'Bob' \
             UNION ALL SELECT 3, 'Carol'",
            "sqlite::memory:",
        ))
        .unwrap();

    let snapshot = wait_for_terminal(&tracker, id).await;
    assert_eq!(snapshot.status, QueryStatus::Success, "{:?}", snapshot.error);
    assert_eq!(
        snapshot.results.as_deref(),
        Some("Rows returned: 3, first record: {id: 1, name: Alice}")
    );
    assert_eq!(snapshot.target, "sqlite::memory:");
}

/// Scenario: Row cap
/// Given a tracker materializing at most ten rows
/// When a statement returns 25 rows
/// Then the summary still reports all 25
#[tokio::test]
async fn test_sqlite_row_cap_keeps_total() {
    let config = TrackerConfig {
        max_rows: 10,
        ..Default::default()
    };
    let tracker = Tracker::with_sqlx(&config);

    let id = tracker
        .submit(SubmitRequest::new(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 25) \
             SELECT x FROM n",
            "sqlite::memory:",
        ))
        .unwrap();

    let snapshot = wait_for_terminal(&tracker, id).await;
    assert_eq!(
        snapshot.results.as_deref(),
        Some("Rows returned: 25, first record: {x: 1}")
    );
}

/// Scenario: Statement with no rows
#[tokio::test]
async fn test_sqlite_statement_without_rows() {
    let tracker = Tracker::with_sqlx(&TrackerConfig::default());

    let id = tracker
        .submit(SubmitRequest::new(
            "CREATE TABLE t (id INTEGER PRIMARY KEY)",
            "sqlite::memory:",
        ))
        .unwrap();

    let snapshot = wait_for_terminal(&tracker, id).await;
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.results.as_deref(), Some("Rows returned: 0"));
}

/// Scenario: Invalid SQL
#[tokio::test]
async fn test_sqlite_invalid_sql() {
    let tracker = Tracker::with_sqlx(&TrackerConfig::default());

    let id = tracker
        .submit(SubmitRequest::new("SELEC nonsense", "sqlite::memory:"))
        .unwrap();

    let snapshot = wait_for_terminal(&tracker, id).await;
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert!(snapshot.error.unwrap().starts_with("Execution error:"));
    assert!(snapshot.results.is_none());
}

/// Scenario: Database file that does not exist
/// Given a target pointing at a missing file
/// When a query is submitted
/// Then it fails with a connection error rather than creating the file
#[tokio::test]
async fn test_sqlite_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.db");
    let target = format!("sqlite://{}", path.display());
    let tracker = Tracker::with_sqlx(&TrackerConfig::default());

    let id = tracker
        .submit(SubmitRequest::new("SELECT 1", target))
        .unwrap();

    let snapshot = wait_for_terminal(&tracker, id).await;
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert!(snapshot.error.unwrap().starts_with("Connection error:"));
    assert!(!path.exists());
}

/// Scenario: Unsupported scheme
/// Given a target with a scheme no backend handles
/// Then submission is refused and nothing is registered
#[tokio::test]
async fn test_unsupported_scheme_is_refused() {
    let tracker = Tracker::with_sqlx(&TrackerConfig::default());

    let err = tracker
        .submit(SubmitRequest::new("SELECT 1", "mysql://localhost/db"))
        .unwrap_err();
    assert!(matches!(err, InflightError::Submission(_)));
    assert!(tracker.registry().is_empty());
}

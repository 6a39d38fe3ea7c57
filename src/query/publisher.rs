//! Periodic snapshots of the registry for streaming consumers.
//!
//! Every consumer gets its own publisher and its own timer; all of them read
//! the same shared [`Registry`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::query::registry::Registry;
use crate::query::state::{QuerySnapshot, QueryStatus};

/// Default interval between two snapshot sets.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The full registry state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSet {
    /// Tick number, starting at 1.
    pub tick: u64,
    pub taken_at: DateTime<Utc>,
    pub queries: Vec<QuerySnapshot>,
}

impl SnapshotSet {
    /// Returns true if no query in the set is still running.
    pub fn all_terminal(&self) -> bool {
        self.queries.iter().all(|q| q.status.is_terminal())
    }

    /// Number of queries in the set with the given status.
    pub fn count(&self, status: QueryStatus) -> usize {
        self.queries.iter().filter(|q| q.status == status).count()
    }

    /// Encodes the set for transport.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Emits a [`SnapshotSet`] on every tick.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    registry: Arc<Registry>,
    interval: Duration,
}

impl SnapshotPublisher {
    /// Creates a publisher ticking every `interval`.
    pub fn new(registry: Arc<Registry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Materializes the registry for tick number `tick`.
    pub fn collect(&self, tick: u64, now: Instant) -> SnapshotSet {
        SnapshotSet {
            tick,
            taken_at: Utc::now(),
            queries: self.registry.snapshot(now),
        }
    }

    fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Turns the publisher into a lazy, infinite stream of snapshot sets.
    ///
    /// The timer starts on the first poll, so the first set arrives one
    /// interval after it. Dropping the stream stops the timer.
    pub fn into_stream(self) -> impl Stream<Item = SnapshotSet> + Send + 'static {
        futures::stream::unfold(
            (self, None::<Interval>, 0u64),
            |(publisher, ticker, tick)| async move {
                let mut ticker = ticker.unwrap_or_else(|| publisher.ticker());
                let now = ticker.tick().await;
                let tick = tick + 1;
                let set = publisher.collect(tick, now);
                Some((set, (publisher, Some(ticker), tick)))
            },
        )
    }

    /// Sends a JSON-encoded snapshot set into `sink` on every tick.
    ///
    /// Stops when the consumer is gone (a send fails) or `stop` is cancelled,
    /// and returns the number of sets delivered. There is no retry.
    pub async fn run(self, sink: mpsc::Sender<String>, stop: CancellationToken) -> Result<u64> {
        let mut ticker = self.ticker();
        let mut delivered = 0u64;

        loop {
            let now = tokio::select! {
                biased;

                _ = stop.cancelled() => break,
                _ = sink.closed() => break,
                now = ticker.tick() => now,
            };

            let payload = self.collect(delivered + 1, now).to_json()?;
            if sink.send(payload).await.is_err() {
                break;
            }
            delivered += 1;
        }

        debug!("Snapshot publisher stopped after {} sets", delivered);
        Ok(delivered)
    }
}

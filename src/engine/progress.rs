//! Result aggregation and periodic progress reporting.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::model::Outcome;

/// Running totals over an outcome stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Successfully applied objects.
    pub processed: u64,
    pub errors: u64,
    /// Failed attempts that preceded a success.
    pub retries: u64,
    pub last_object: Option<String>,
}

impl Summary {
    pub fn record(&mut self, outcome: &Outcome) {
        if outcome.success {
            self.processed += 1;
            self.retries += u64::from(outcome.retries);
        } else {
            self.errors += 1;
            warn!(worker = %outcome.worker, "{outcome}");
        }
        self.last_object = Some(outcome.object_name());
    }
}

/// Drains the result stream, logging a progress line every `interval`.
#[derive(Debug, Clone)]
pub struct Progress {
    interval: Duration,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Progress {
    /// Intervals shorter than a millisecond are raised to one.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Consume outcomes until the stream closes and return the totals.
    pub async fn run(self, mut results: mpsc::Receiver<Outcome>) -> Summary {
        let mut summary = Summary::default();
        let mut reported = 0;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rate = (summary.processed - reported) as f64 / self.interval.as_secs_f64();
                    info!(
                        processed = summary.processed,
                        per_sec = rate.round() as u64,
                        retries = summary.retries,
                        errors = summary.errors,
                        last_object = summary.last_object.as_deref().unwrap_or_default(),
                        "import progress"
                    );
                    reported = summary.processed;
                }
                outcome = results.recv() => match outcome {
                    Some(outcome) => summary.record(&outcome),
                    None => break,
                },
            }
        }

        info!(
            processed = summary.processed,
            retries = summary.retries,
            errors = summary.errors,
            "import complete"
        );
        summary
    }
}

//! Batched enrichment executor.
//!
//! Maps an async enrichment function over a list of items in consecutive
//! groups of at most `batch_size`. All members of a group run concurrently
//! and the executor waits for every one of them to settle before sleeping
//! `inter_batch_delay` and starting the next group. The delay is the only
//! throttle; it bounds in-flight provider calls to `batch_size`.
//!
//! Failures are logged and dropped. Successes keep their input order.

use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::config::BatchConfig;
use crate::error::EnrichmentFailure;

/// Outcome of one `run_batched` call.
#[derive(Debug)]
pub struct BatchOutcome<U> {
    /// Successful results, in input order
    pub results: Vec<U>,
    /// Failed items, in input order
    pub failures: Vec<EnrichmentFailure>,
    /// Groups actually executed
    pub batches: usize,
    /// Items never attempted because the deadline passed
    pub skipped: usize,
}

impl<U> Default for BatchOutcome<U> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
            batches: 0,
            skipped: 0,
        }
    }
}

impl<U> BatchOutcome<U> {
    pub fn into_results(self) -> Vec<U> {
        self.results
    }
}

/// Bounded-concurrency executor shared by the ranking and valuation stages.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    batch_size: usize,
    inter_batch_delay: Duration,
    deadline: Option<Instant>,
}

impl BatchExecutor {
    /// A zero batch size is treated as 1.
    pub fn new(batch_size: usize, inter_batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            inter_batch_delay,
            deadline: None,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.size, config.delay())
    }

    /// Refuse to start new groups once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run `enrich` over `items` in paced groups.
    pub async fn run_batched<T, U, F, Fut>(&self, items: Vec<T>, enrich: F) -> BatchOutcome<U>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<U, EnrichmentFailure>>,
    {
        let total = items.len();
        let total_batches = total.div_ceil(self.batch_size);
        let mut outcome = BatchOutcome::default();
        let mut pending = items.into_iter().peekable();

        while pending.peek().is_some() {
            if outcome.batches > 0 && !self.inter_batch_delay.is_zero() {
                // Never pause past the deadline
                let resume = Instant::now() + self.inter_batch_delay;
                sleep_until(self.deadline.map_or(resume, |d| d.min(resume))).await;
            }

            if self.deadline_passed() {
                outcome.skipped = pending.count();
                warn!(
                    skipped = outcome.skipped,
                    completed_batches = outcome.batches,
                    total_batches,
                    "Run budget exhausted, skipping remaining items"
                );
                break;
            }

            let group: Vec<T> = pending.by_ref().take(self.batch_size).collect();
            let group_len = group.len();
            let settled = join_all(group.into_iter().map(|item| enrich(item))).await;

            let mut failed = 0;
            for result in settled {
                match result {
                    Ok(value) => outcome.results.push(value),
                    Err(failure) => {
                        warn!(
                            symbol = %failure.symbol,
                            stage = %failure.stage,
                            error = %failure.cause,
                            "Enrichment failed, dropping item"
                        );
                        failed += 1;
                        outcome.failures.push(failure);
                    }
                }
            }

            outcome.batches += 1;
            debug!(
                batch = outcome.batches,
                total_batches,
                size = group_len,
                failed,
                "Batch settled"
            );
        }

        outcome
    }
}

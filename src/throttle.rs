//! Bounded-concurrency batch execution for provider calls.
//!
//! Work is split into batches of `batch_size`; each batch runs concurrently on
//! a dedicated rayon pool with `batch_size` threads and the executor waits for
//! the whole batch (plus an optional pause) before starting the next one.

use std::time::Duration;

use rayon::prelude::*;
use tracing::warn;

pub struct BatchExecutor {
    pool: Option<rayon::ThreadPool>,
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchExecutor {
    pub fn new(batch_size: usize, batch_delay: Duration) -> Self {
        let batch_size = batch_size.max(1);
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(batch_size).build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(error = %err, "could not build routing pool, running batches sequentially");
                None
            }
        };

        Self {
            pool,
            batch_size,
            batch_delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Apply `task` to every item. Results come back in input order.
    pub fn run<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let mut results = Vec::with_capacity(items.len());
        let batches = items.chunks(self.batch_size);
        let batch_count = batches.len();

        for (batch_index, batch) in batches.enumerate() {
            let batch_results: Vec<R> = match &self.pool {
                Some(pool) => pool.install(|| batch.par_iter().map(&task).collect()),
                None => batch.iter().map(&task).collect(),
            };
            results.extend(batch_results);

            if batch_index + 1 < batch_count && !self.batch_delay.is_zero() {
                std::thread::sleep(self.batch_delay);
            }
        }

        results
    }
}

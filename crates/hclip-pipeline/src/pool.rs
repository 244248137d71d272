//! Bound on concurrently running heavy stages.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::Stage;
use crate::metrics::record_stage_duration;

/// Shared permit pool for CPU/GPU-heavy stages across all runs.
#[derive(Debug, Clone)]
pub struct StagePool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl StagePool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `work` while holding a permit.
    pub async fn run<F, T>(&self, stage: Stage, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let queued = Instant::now();
        // The semaphore is never closed
        let _permit = self.semaphore.acquire().await.ok();
        debug!(
            stage = stage.as_str(),
            waited_ms = queued.elapsed().as_millis() as u64,
            "Stage permit acquired"
        );
        self.timed(stage, work).await
    }

    /// Run `work` without a permit, still recording its duration.
    pub async fn timed<F, T>(&self, stage: Stage, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = work.await;
        record_stage_duration(stage.as_str(), started.elapsed().as_secs_f64());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let pool = StagePool::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                pool.run(Stage::Transcription, async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_timed_holds_no_permit() {
        let pool = StagePool::new(1);
        let free = pool.timed(Stage::Selection, async { pool.available() }).await;
        assert_eq!(free, 1);

        let free = pool.run(Stage::Extraction, async { pool.available() }).await;
        assert_eq!(free, 0);
    }

    #[test]
    fn test_zero_size_is_raised_to_one() {
        assert_eq!(StagePool::new(0).size(), 1);
    }
}

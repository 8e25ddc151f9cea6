//! Fixed-size worker pool backed by rayon
//!
//! Loads and compiles are CPU bound and short, so each task is driven to
//! completion on one pool thread with a minimal executor.

use super::AsyncSpawner;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Failed to build worker pool: {0}")]
pub struct WorkerPoolError(#[from] rayon::ThreadPoolBuildError);

/// Rayon-based async spawner with a fixed number of worker threads
#[derive(Clone, Debug)]
pub struct RayonSpawner {
    pool: Arc<rayon::ThreadPool>,
    num_threads: usize,
}

impl RayonSpawner {
    /// Create a pool with `num_threads` workers; 0 lets rayon pick one per core
    pub fn new(num_threads: usize) -> Result<Self, WorkerPoolError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("resource-worker-{index}"))
            .build()?;
        let num_threads = pool.current_num_threads();
        log::debug!("Created resource worker pool with {num_threads} threads");

        Ok(Self {
            pool: Arc::new(pool),
            num_threads,
        })
    }

    /// Get the number of threads in the pool
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl AsyncSpawner for RayonSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pool.spawn(move || futures::executor::block_on(task));
    }

    fn runtime_name(&self) -> &'static str {
        "Rayon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{spawn_work, WorkPoll};
    use std::time::{Duration, Instant};

    #[test]
    fn test_rayon_spawner_thread_count() {
        let spawner = RayonSpawner::new(2).unwrap();
        assert_eq!(spawner.num_threads(), 2);
        assert_eq!(spawner.runtime_name(), "Rayon");
    }

    #[test]
    fn test_rayon_spawn_work_completes() {
        let spawner = RayonSpawner::new(2).unwrap();
        let mut work = spawn_work(&spawner, || (1..=10u32).sum::<u32>());

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            match work.try_take() {
                WorkPoll::Pending if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(1))
                }
                other => break other,
            }
        };
        assert_eq!(result, WorkPoll::Ready(55));
    }
}

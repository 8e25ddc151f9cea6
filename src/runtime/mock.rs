//! Mock spawner for tests
//!
//! Runs tasks inline, parks them until the test releases them, or drops
//! them outright to simulate a runtime going away.

use super::{AsyncSpawner, BoxFuture};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Drop tasks without running them
    Drop,
    /// Run each task to completion inside `spawn`
    BlockSync,
    /// Queue tasks until [`MockSpawner::run_pending`] is called
    Deferred,
}

/// Deterministic spawner for tests and demos
///
/// Clones share the deferred queue, so a test can keep one clone and hand
/// the other to the code under test.
#[derive(Clone)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
    queue: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl fmt::Debug for MockSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSpawner")
            .field("behavior", &self.behavior)
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Spawner that drops every task
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    pub fn deferred() -> Self {
        Self::with_behavior(MockSpawnBehavior::Deferred)
    }

    pub fn behavior(&self) -> MockSpawnBehavior {
        self.behavior
    }

    /// Number of tasks waiting in the deferred queue
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every queued task to completion, returns how many ran
    ///
    /// Tasks queued while this runs wait for the next call.
    pub fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *self.queue.lock());
        let count = tasks.len();
        for task in tasks {
            futures::executor::block_on(task);
        }
        count
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => drop(task),
            MockSpawnBehavior::BlockSync => futures::executor::block_on(task),
            MockSpawnBehavior::Deferred => self.queue.lock().push(Box::pin(task)),
        }
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }
}

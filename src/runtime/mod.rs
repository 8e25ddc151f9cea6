//! Async runtime abstraction for background loads and compiles
//!
//! Asset loads and shader/pipeline compiles run on whichever executor the
//! manager was built with: a rayon worker pool, tokio, or the mock used in
//! tests.
//!
//! The render thread never waits on a result: [`spawn_work`] returns a
//! [`WorkHandle`] that is polled once per frame with [`WorkHandle::try_take`].

pub mod mock;
#[cfg(feature = "runtime-rayon")]
pub mod rayon_impl;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use futures::channel::oneshot;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A boxed future that can be sent across threads
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executor that runs background loads and compiles
///
/// Implementations decide where the work runs; results always travel back
/// through [`WorkHandle`]s, so a spawner never has to return anything.
///
/// # Example
/// ```ignore
/// let spawner = RayonSpawner::new(4)?;
/// let mut work = spawn_work(&spawner, || compile(source));
/// // next frame
/// if let WorkPoll::Ready(shader) = work.try_take() { /* ... */ }
/// ```
pub trait AsyncSpawner: Send + Sync + Clone + Debug + 'static {
    /// Run `task` in the background
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Name of this runtime, for logs
    fn runtime_name(&self) -> &'static str;
}

/// Outcome of polling a [`WorkHandle`]
#[derive(Debug, PartialEq, Eq)]
pub enum WorkPoll<T> {
    /// Still queued or running
    Pending,
    /// Finished; the value has been moved out of the handle
    Ready(T),
    /// The task was dropped before producing a value
    Lost,
}

/// Result slot of a closure running on a spawner
///
/// Completion is published through an atomic flag; the value itself travels
/// through a one-shot channel so polling never takes a lock.
#[derive(Debug)]
pub struct WorkHandle<T> {
    finished: Arc<AtomicBool>,
    receiver: oneshot::Receiver<T>,
}

impl<T> WorkHandle<T> {
    /// Whether the worker has produced its value
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Take the value if it is ready. Never blocks.
    pub fn try_take(&mut self) -> WorkPoll<T> {
        match self.receiver.try_recv() {
            Ok(Some(value)) => WorkPoll::Ready(value),
            Ok(None) => WorkPoll::Pending,
            Err(oneshot::Canceled) => WorkPoll::Lost,
        }
    }
}

/// Run `work` on `spawner` and return a pollable handle to its result
pub fn spawn_work<S, T, F>(spawner: &S, work: F) -> WorkHandle<T>
where
    S: AsyncSpawner,
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    spawner.spawn(async move {
        let value = work();
        // The receiver may be gone if the requester was reset meanwhile.
        let _ = sender.send(value);
        flag.store(true, Ordering::Release);
    });

    WorkHandle { finished, receiver }
}

// Re-export implementations
pub use mock::{MockSpawnBehavior, MockSpawner};

#[cfg(feature = "runtime-rayon")]
pub use rayon_impl::RayonSpawner;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;

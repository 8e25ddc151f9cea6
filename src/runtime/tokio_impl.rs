//! Tokio spawner

use super::AsyncSpawner;
use std::future::Future;
use tokio::runtime::Handle;

/// Spawns onto the runtime captured at construction, or onto the ambient
/// runtime of the calling thread when none was given
#[derive(Clone, Debug, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Always spawn on `handle`; the render thread then needs no runtime
    /// context of its own
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Loads and compiles are CPU bound; keep them off the async workers.
        let blocking = move || futures::executor::block_on(task);
        match &self.handle {
            Some(handle) => drop(handle.spawn_blocking(blocking)),
            None => drop(tokio::task::spawn_blocking(blocking)),
        }
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{spawn_work, WorkPoll};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawn_work_polls_to_ready() {
        let spawner = TokioSpawner::new();
        let mut work = spawn_work(&spawner, || 42u32);

        let mut result = WorkPoll::Pending;
        for _ in 0..100 {
            result = work.try_take();
            if result != WorkPoll::Pending {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(result, WorkPoll::Ready(42));
    }

    #[test]
    fn test_with_handle_outside_runtime_context() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let spawner = TokioSpawner::with_handle(runtime.handle().clone());
        let mut work = spawn_work(&spawner, || "done");

        let mut result = WorkPoll::Pending;
        for _ in 0..500 {
            result = work.try_take();
            if result != WorkPoll::Pending {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(result, WorkPoll::Ready("done"));
        assert_eq!(spawner.runtime_name(), "Tokio");
    }
}

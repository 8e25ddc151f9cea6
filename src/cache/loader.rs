//! Background asset loads
//!
//! Each load runs `LoadableAsset::load` on the spawner and is polled by the
//! cache once per update. A load carries the reload generation it was started
//! for, so a result that raced with a newer reload request can be recognized
//! and dropped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::AssetHandle;
use crate::library::{LibraryResult, LoadableAsset};
use crate::runtime::{spawn_work, AsyncSpawner, WorkHandle, WorkPoll};

#[derive(Debug)]
pub(crate) struct InFlightLoad {
    pub handle: AssetHandle,
    pub generation: u64,
    started: Instant,
    work: WorkHandle<LibraryResult<usize>>,
}

#[derive(Debug)]
pub(crate) struct FinishedLoad {
    pub handle: AssetHandle,
    pub generation: u64,
    pub elapsed: Duration,
    /// `None` when the worker dropped the task without running it
    pub result: Option<LibraryResult<usize>>,
}

impl InFlightLoad {
    pub fn start<S: AsyncSpawner>(
        spawner: &S,
        asset: Arc<dyn LoadableAsset>,
        generation: u64,
    ) -> Self {
        let handle = asset.handle();
        log::debug!("Scheduling load of asset {}", asset.asset_id());
        Self {
            handle,
            generation,
            started: Instant::now(),
            work: spawn_work(spawner, move || asset.load()),
        }
    }

    /// Take the result if the worker is done with it
    pub fn poll(&mut self) -> Option<FinishedLoad> {
        let result = match self.work.try_take() {
            WorkPoll::Pending => return None,
            WorkPoll::Ready(result) => Some(result),
            WorkPoll::Lost => None,
        };
        Some(FinishedLoad {
            handle: self.handle,
            generation: self.generation,
            elapsed: self.started.elapsed(),
            result,
        })
    }
}

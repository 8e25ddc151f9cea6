//! Memory-budgeted asset cache with LRU eviction
//!
//! The cache owns one record per asset id and decides, once per frame in
//! [`CustomAssetCache::update`], which assets to load, which loaded assets to
//! keep and which to evict. Two [`AssetPriorityQueue`]s drive that:
//! the pending queue (assets waiting for a load) and the active queue
//! (loaded assets ordered by how recently a resource drew with them).
//!
//! Listeners are resources, named by [`ResourceId`]. The cache never calls
//! into them directly; it reports through an [`AssetListener`] passed to
//! `update`.

pub mod loader;
pub mod metrics;
pub mod pool;
pub mod queue;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::CacheConfig;
use crate::error::{ResourceError, Result};
use crate::library::{AssetId, AssetLibrary, AssetPayload, CustomAsset, LoadableAsset};
use crate::resource::ResourceId;
use crate::runtime::AsyncSpawner;
use loader::{FinishedLoad, InFlightLoad};
use metrics::CacheMetricsHandle;

pub use pool::TexturePool;
pub use queue::AssetPriorityQueue;

/// Dense index assigned once per asset id
///
/// Never reused for another id until the cache is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetHandle(u32);

impl AssetHandle {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadStatus {
    /// Needs a (re)load before its data can be trusted
    PendingReload,
    /// Last load finished, successfully or with errors
    LoadFinished,
    /// Evicted; data dropped until requested again
    Unloaded,
}

/// Receives per-listener callbacks from [`CustomAssetCache::update`]
pub trait AssetListener {
    fn notify_asset_load_success(&mut self, listener: ResourceId, asset: AssetHandle);

    fn notify_asset_load_failed(&mut self, listener: ResourceId, asset: AssetHandle);

    fn asset_unloaded(&mut self, listener: ResourceId, asset: AssetHandle);
}

/// Thread-safe queue of assets whose source changed
///
/// Cloned out to file watchers or editors; drained by the next `update`.
#[derive(Debug, Clone, Default)]
pub struct DirtyAssetNotifier {
    queue: Arc<Mutex<Vec<AssetId>>>,
}

impl DirtyAssetNotifier {
    pub fn mark_asset_dirty(&self, id: impl Into<AssetId>) {
        self.queue.lock().push(id.into());
    }

    fn drain(&self) -> Vec<AssetId> {
        std::mem::take(&mut *self.queue.lock())
    }
}

/// Per-asset record
#[derive(Debug)]
pub struct AssetData {
    asset: Arc<dyn LoadableAsset>,
    listeners: Vec<ResourceId>,
    last_requested: Instant,
    /// Frame of the last activation or finished load
    last_active_frame: u64,
    has_errors: bool,
    load_status: LoadStatus,
    resident_bytes: usize,
    /// Bumped by every reload request; loads started for an older value are stale
    generation: u64,
}

impl AssetData {
    pub fn asset_id(&self) -> &str {
        self.asset.asset_id()
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub fn listeners(&self) -> &[ResourceId] {
        &self.listeners
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn last_request_time(&self) -> Instant {
        self.last_requested
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    pub fn last_active_frame(&self) -> u64 {
        self.last_active_frame
    }

    fn request_reload(&mut self) {
        self.generation += 1;
        self.load_status = LoadStatus::PendingReload;
    }
}

pub struct CustomAssetCache<S: AsyncSpawner> {
    config: CacheConfig,
    spawner: S,
    assets: Vec<AssetData>,
    handles: HashMap<AssetId, AssetHandle>,
    active: AssetPriorityQueue,
    pending: AssetPriorityQueue,
    loads: Vec<InFlightLoad>,
    dirty: DirtyAssetNotifier,
    ram_used: usize,
    /// Incremented at the end of every `update`
    frame: u64,
    metrics: CacheMetricsHandle,
}

impl<S: AsyncSpawner> std::fmt::Debug for CustomAssetCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomAssetCache")
            .field("runtime", &self.spawner.runtime_name())
            .field("assets", &self.assets.len())
            .field("active", &self.active.len())
            .field("pending", &self.pending.len())
            .field("loads_in_flight", &self.loads.len())
            .field("ram_used", &self.ram_used)
            .finish()
    }
}

impl<S: AsyncSpawner> CustomAssetCache<S> {
    pub fn new(spawner: S, config: CacheConfig) -> Self {
        Self {
            config,
            spawner,
            assets: Vec::new(),
            handles: HashMap::new(),
            active: AssetPriorityQueue::new(),
            pending: AssetPriorityQueue::new(),
            loads: Vec::new(),
            dirty: DirtyAssetNotifier::default(),
            ram_used: 0,
            frame: 0,
            metrics: CacheMetricsHandle::new(),
        }
    }

    /// Start from a clean slate with fresh metrics
    pub fn initialize(&mut self) {
        self.reset();
        self.metrics.reset();
        log::info!(
            "Asset cache initialized on {} with a {} byte budget",
            self.spawner.runtime_name(),
            self.config.memory_budget_bytes
        );
    }

    pub fn shutdown(&mut self) {
        self.reset();
        log::info!("Asset cache shut down");
    }

    /// Unload and forget every asset. Handles start from zero again.
    pub fn reset(&mut self) {
        for data in &self.assets {
            data.asset.unload();
        }
        // In-flight results are dropped with their receivers.
        self.loads.clear();
        self.assets.clear();
        self.handles.clear();
        self.active.clear();
        self.pending.clear();
        self.dirty.drain();
        self.ram_used = 0;
        self.frame = 0;
    }

    /// Find or create the record for `id`
    ///
    /// The first call creates the asset with status `PendingReload`. Later
    /// calls return the same asset, append `listener` and request a reload.
    pub fn create_asset<D: AssetPayload>(
        &mut self,
        id: &str,
        library: Arc<dyn AssetLibrary>,
        listener: Option<ResourceId>,
    ) -> Result<Arc<CustomAsset<D>>> {
        if let Some(&handle) = self.handles.get(id) {
            let data = &mut self.assets[handle.index()];
            let registered = data.asset.kind();
            let asset = Arc::clone(&data.asset)
                .into_any()
                .downcast::<CustomAsset<D>>()
                .map_err(|_| ResourceError::AssetTypeMismatch {
                    id: id.to_string(),
                    registered,
                    requested: D::KIND,
                })?;

            data.listeners.extend(listener);
            data.last_requested = Instant::now();
            data.request_reload();
            self.pending.insert_asset(handle);
            return Ok(asset);
        }

        let handle = AssetHandle::new(self.assets.len() as u32);
        let asset = Arc::new(CustomAsset::<D>::new(id.to_string(), handle, library));
        self.assets.push(AssetData {
            asset: Arc::clone(&asset) as Arc<dyn LoadableAsset>,
            listeners: listener.into_iter().collect(),
            last_requested: Instant::now(),
            last_active_frame: self.frame,
            has_errors: false,
            load_status: LoadStatus::PendingReload,
            resident_bytes: 0,
            generation: 0,
        });
        self.handles.insert(id.to_string(), handle);
        log::debug!("Registered asset {id} as {handle:?}");
        Ok(asset)
    }

    /// Queue a reload of `id`; safe to call from any thread holding a
    /// [`DirtyAssetNotifier`]
    pub fn mark_asset_dirty(&self, id: impl Into<AssetId>) {
        self.dirty.mark_asset_dirty(id);
    }

    pub fn dirty_notifier(&self) -> DirtyAssetNotifier {
        self.dirty.clone()
    }

    /// Ask for `handle` to be loaded, at the lowest priority
    ///
    /// No-op for assets whose load already finished.
    pub fn mark_asset_pending(&mut self, handle: AssetHandle) {
        let Some(data) = self.assets.get_mut(handle.index()) else {
            return;
        };
        data.last_requested = Instant::now();
        match data.load_status {
            LoadStatus::LoadFinished => return,
            LoadStatus::Unloaded => data.request_reload(),
            LoadStatus::PendingReload => {}
        }
        self.pending.insert_asset(handle);
    }

    /// Record that `handle` was used this frame
    ///
    /// An asset that already has a slot in the active queue moves to the
    /// front; one without a slot gets one at the back. Either way it is
    /// only evicted this frame when nothing older can go.
    pub fn mark_asset_active(&mut self, handle: AssetHandle) {
        let Some(data) = self.assets.get_mut(handle.index()) else {
            return;
        };
        data.last_requested = Instant::now();
        data.last_active_frame = self.frame;
        if self.active.contains(handle) {
            self.active.make_asset_highest_priority(handle);
        } else {
            self.active.insert_asset(handle);
        }
    }

    /// Per-frame step: reload dirty assets, start and finish loads, then
    /// evict until the resident data fits the budget
    pub fn update(&mut self, listener: &mut dyn AssetListener) {
        self.process_dirty_assets();
        self.schedule_loads();
        self.poll_loads(listener);
        self.evict_over_budget(listener);
        self.frame += 1;
    }

    fn process_dirty_assets(&mut self) {
        for id in self.dirty.drain() {
            let Some(&handle) = self.handles.get(&id) else {
                log::debug!("Ignoring change notification for unknown asset {id}");
                continue;
            };
            self.assets[handle.index()].request_reload();
            self.pending.make_asset_highest_priority(handle);
            log::debug!("Asset {id} changed, reload requested");
        }
    }

    fn schedule_loads(&mut self) {
        let capacity = self
            .config
            .max_loads_in_flight
            .saturating_sub(self.loads.len());
        if capacity == 0 {
            return;
        }

        let ready: Vec<AssetHandle> = self
            .pending
            .iter()
            .filter(|&handle| {
                self.assets[handle.index()].load_status == LoadStatus::PendingReload
                    && !self.loads.iter().any(|load| load.handle == handle)
            })
            .take(capacity)
            .collect();

        for handle in ready {
            let data = &self.assets[handle.index()];
            let load = InFlightLoad::start(&self.spawner, Arc::clone(&data.asset), data.generation);
            self.loads.push(load);
        }
    }

    fn poll_loads(&mut self, listener: &mut dyn AssetListener) {
        let mut finished = Vec::new();
        self.loads.retain_mut(|load| match load.poll() {
            Some(done) => {
                finished.push(done);
                false
            }
            None => true,
        });

        for done in finished {
            self.finish_load(done, listener);
        }
    }

    fn finish_load(&mut self, done: FinishedLoad, listener: &mut dyn AssetListener) {
        let handle = done.handle;
        let Some(data) = self.assets.get_mut(handle.index()) else {
            return;
        };

        if done.generation != data.generation {
            // Stays pending; the next update starts a fresh load.
            log::warn!(
                "Discarding stale load of asset {}, a newer reload was requested",
                data.asset.asset_id()
            );
            self.metrics.record_stale_load();
            return;
        }

        let succeeded = match done.result {
            Some(Ok(bytes)) => {
                self.ram_used = self.ram_used.saturating_sub(data.resident_bytes) + bytes;
                data.resident_bytes = bytes;
                data.has_errors = false;
                true
            }
            Some(Err(err)) => {
                log::error!("Failed to load asset {}: {err}", data.asset.asset_id());
                data.has_errors = true;
                false
            }
            None => {
                log::error!(
                    "Load of asset {} was dropped by the {} runtime",
                    data.asset.asset_id(),
                    self.spawner.runtime_name()
                );
                data.has_errors = true;
                false
            }
        };
        data.load_status = LoadStatus::LoadFinished;
        data.last_active_frame = self.frame;
        self.metrics
            .record_load(data.asset.asset_id(), done.elapsed, succeeded);

        self.pending.remove_asset(handle);
        self.active.insert_asset(handle);

        // Errors are reported too, so dependents park instead of polling.
        for &resource in &data.listeners {
            if succeeded {
                listener.notify_asset_load_success(resource, handle);
            } else {
                listener.notify_asset_load_failed(resource, handle);
            }
        }
    }

    fn evict_over_budget(&mut self, listener: &mut dyn AssetListener) {
        let budget = self.config.memory_budget_bytes;
        if self.ram_used <= budget {
            return;
        }

        // Least recently active first, but assets used this frame only
        // after every older candidate.
        let frame = self.frame;
        let evictable = |handle: &AssetHandle, this_frame: bool| {
            let data = &self.assets[handle.index()];
            data.load_status == LoadStatus::LoadFinished
                && !self.pending.contains(*handle)
                && (data.last_active_frame == frame) == this_frame
        };
        let older = self.active.iter_lowest_first().filter(|h| evictable(h, false));
        let recent = self.active.iter_lowest_first().filter(|h| evictable(h, true));

        let mut projected = self.ram_used;
        let victims: Vec<AssetHandle> = older
            .chain(recent)
            .take_while(|&handle| {
                let over = projected > budget;
                projected = projected.saturating_sub(self.assets[handle.index()].resident_bytes);
                over
            })
            .collect();

        for handle in victims {
            self.active.remove_asset(handle);
            let data = &mut self.assets[handle.index()];
            data.asset.unload();
            let freed = std::mem::take(&mut data.resident_bytes);
            self.ram_used = self.ram_used.saturating_sub(freed);
            data.load_status = LoadStatus::Unloaded;
            self.metrics.record_eviction(freed);
            log::debug!("Evicted asset {} ({freed} bytes)", data.asset.asset_id());

            for &resource in &data.listeners {
                listener.asset_unloaded(resource, handle);
            }
        }
    }

    pub fn handle_for(&self, id: &str) -> Option<AssetHandle> {
        self.handles.get(id).copied()
    }

    pub fn asset_data(&self, handle: AssetHandle) -> Option<&AssetData> {
        self.assets.get(handle.index())
    }

    pub fn load_status(&self, handle: AssetHandle) -> Option<LoadStatus> {
        self.asset_data(handle).map(AssetData::load_status)
    }

    pub fn has_errors(&self, handle: AssetHandle) -> bool {
        self.asset_data(handle).is_some_and(AssetData::has_errors)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn active_queue(&self) -> &AssetPriorityQueue {
        &self.active
    }

    pub fn pending_queue(&self) -> &AssetPriorityQueue {
        &self.pending
    }

    pub fn loads_in_flight(&self) -> usize {
        self.loads.len()
    }

    /// Bytes of loaded asset data currently resident
    pub fn memory_usage(&self) -> usize {
        self.ram_used
    }

    pub fn memory_budget(&self) -> usize {
        self.config.memory_budget_bytes
    }

    /// Takes effect on the next `update`
    pub fn set_memory_budget(&mut self, bytes: usize) {
        self.config.memory_budget_bytes = bytes;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn metrics(&self) -> &CacheMetricsHandle {
        &self.metrics
    }
}

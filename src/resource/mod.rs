//! Derived resources and the state machine that builds them
//!
//! A resource turns one asset (plus whatever other resources it depends on)
//! into an immutable, render-ready `Data` snapshot. Building happens in
//! three hooks driven by [`CustomResourceManager::process`]:
//!
//! 1. `collect_primary_data` - snapshot the resource's own asset
//! 2. `collect_dependency_data` - request and reference sibling resources
//! 3. `process_data` - derive the data, possibly on a worker thread
//!
//! Each hook returns a [`TaskComplete`]. `No` means try again next frame,
//! `Error` parks the resource until its asset (or a dependency's) changes.
//!
//! Resources live in a [`slotmap`] arena owned by the manager. Dependency
//! edges are stored as ids on both ends so invalidation can walk outward
//! without any owning pointers.
//!
//! [`CustomResourceManager::process`]: crate::manager::CustomResourceManager::process

pub mod material;
pub mod mesh;
pub mod render_target;
pub mod shader;
pub mod texture;

use slotmap::{new_key_type, SlotMap};
use std::any::Any;
use std::collections::HashSet;

use crate::cache::{AssetHandle, CustomAssetCache, TexturePool};
use crate::gpu::GpuDevice;
use crate::library::{AssetPayload, AssetSnapshot, CustomAsset};
use crate::manager::CustomResourceManager;
use crate::runtime::{AsyncSpawner, WorkHandle, WorkPoll};

new_key_type! {
    /// Stable id of a resource inside one manager
    pub struct ResourceId;
}

/// Tri-state result of a pipeline hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskComplete {
    /// Advance to the next state
    Yes,
    /// Not ready, retry next frame
    #[default]
    No,
    /// Failed; stays failed until invalidated
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    #[default]
    ReloadData,
    CollectingPrimaryData,
    CollectingDependencyData,
    ProcessingData,
    DataAvailable,
}

/// Pipeline hooks implemented by every concrete resource
///
/// Hooks are re-invoked every frame while they return `No`, so they must be
/// idempotent. While a hook runs the resource is detached from the arena;
/// requests that reach it again report its last status instead of recursing,
/// or `Error` when they arrive through its own dependencies.
pub trait Resource<G: GpuDevice, S: AsyncSpawner>: 'static {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        id: ResourceId,
    ) -> TaskComplete;

    fn collect_dependency_data(
        &mut self,
        _manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        TaskComplete::Yes
    }

    fn process_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        id: ResourceId,
    ) -> TaskComplete;

    /// Drop everything collected for the previous build. Published data stays.
    fn reset_data(&mut self);

    /// The owning asset was evicted
    fn on_asset_unloaded(&mut self, _pool: &mut TexturePool<G>) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Bookkeeping shared by every resource
#[derive(Debug, Clone)]
pub struct ResourceCore {
    pub(crate) asset: AssetHandle,
    pub(crate) state: ResourceState,
    pub(crate) data_processed: TaskComplete,
    /// Resources that referenced this one
    pub(crate) dependents: HashSet<ResourceId>,
    /// Resources this one referenced during its current build
    pub(crate) dependencies: Vec<ResourceId>,
}

impl ResourceCore {
    fn new(asset: AssetHandle) -> Self {
        Self {
            asset,
            state: ResourceState::ReloadData,
            data_processed: TaskComplete::No,
            dependents: HashSet::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn asset(&self) -> AssetHandle {
        self.asset
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn data_processed(&self) -> TaskComplete {
        self.data_processed
    }

    pub fn dependents(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.dependents.iter().copied()
    }

    pub fn dependencies(&self) -> &[ResourceId] {
        &self.dependencies
    }
}

pub(crate) struct ResourceEntry<G: GpuDevice, S: AsyncSpawner> {
    pub core: ResourceCore,
    /// `None` while the hooks are running
    pub hooks: Option<Box<dyn Resource<G, S>>>,
}

/// Arena of resources plus the reference graph between them
pub(crate) struct ResourceArena<G: GpuDevice, S: AsyncSpawner> {
    slots: SlotMap<ResourceId, ResourceEntry<G, S>>,
}

impl<G: GpuDevice, S: AsyncSpawner> Default for ResourceArena<G, S> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }
}

impl<G: GpuDevice, S: AsyncSpawner> ResourceArena<G, S> {
    /// Insert a resource whose asset is registered by `build`
    ///
    /// `build` receives the new id so it can be registered as the asset's
    /// listener. Nothing is inserted if it fails.
    pub fn try_insert<E>(
        &mut self,
        build: impl FnOnce(ResourceId) -> Result<(AssetHandle, Box<dyn Resource<G, S>>), E>,
    ) -> Result<ResourceId, E> {
        self.slots.try_insert_with_key(|id| {
            let (asset, hooks) = build(id)?;
            Ok(ResourceEntry {
                core: ResourceCore::new(asset),
                hooks: Some(hooks),
            })
        })
    }

    #[cfg(test)]
    pub fn insert(&mut self, asset: AssetHandle, hooks: Box<dyn Resource<G, S>>) -> ResourceId {
        self.slots.insert(ResourceEntry {
            core: ResourceCore::new(asset),
            hooks: Some(hooks),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn entry_mut(&mut self, id: ResourceId) -> Option<&mut ResourceEntry<G, S>> {
        self.slots.get_mut(id)
    }

    pub fn core(&self, id: ResourceId) -> Option<&ResourceCore> {
        self.slots.get(id).map(|entry| &entry.core)
    }

    pub fn core_mut(&mut self, id: ResourceId) -> Option<&mut ResourceCore> {
        self.slots.get_mut(id).map(|entry| &mut entry.core)
    }

    pub fn hooks<T: 'static>(&self, id: ResourceId) -> Option<&T> {
        self.slots
            .get(id)?
            .hooks
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn hooks_mut<T: 'static>(&mut self, id: ResourceId) -> Option<&mut T> {
        self.slots
            .get_mut(id)?
            .hooks
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Record that `dependent` uses `dependency`. Idempotent.
    pub fn add_reference(&mut self, dependency: ResourceId, dependent: ResourceId) {
        let Some(target) = self.slots.get_mut(dependency) else {
            return;
        };
        target.core.dependents.insert(dependent);
        if let Some(source) = self.slots.get_mut(dependent) {
            if !source.core.dependencies.contains(&dependency) {
                source.core.dependencies.push(dependency);
            }
        }
    }

    pub fn remove_reference(&mut self, dependency: ResourceId, dependent: ResourceId) {
        if let Some(target) = self.slots.get_mut(dependency) {
            target.core.dependents.remove(&dependent);
        }
        if let Some(source) = self.slots.get_mut(dependent) {
            source.core.dependencies.retain(|&id| id != dependency);
        }
    }

    /// Drop every edge from `dependent` to the resources it used
    pub fn remove_references(&mut self, dependent: ResourceId) {
        let dependencies = match self.slots.get_mut(dependent) {
            Some(entry) => std::mem::take(&mut entry.core.dependencies),
            None => return,
        };
        for dependency in dependencies {
            if let Some(entry) = self.slots.get_mut(dependency) {
                entry.core.dependents.remove(&dependent);
            }
        }
    }

    /// Reset `id` and everything that transitively depends on it
    pub fn notify_asset_changed(&mut self, id: ResourceId, error: bool) {
        let mut stack = vec![id];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(entry) = self.slots.get_mut(current) else {
                continue;
            };
            entry.core.state = ResourceState::ReloadData;
            entry.core.data_processed = if error {
                TaskComplete::Error
            } else {
                TaskComplete::No
            };
            stack.extend(entry.core.dependents.iter().copied());
        }
    }

    /// The asset behind `id` was evicted
    pub fn asset_unloaded(&mut self, id: ResourceId, pool: &mut TexturePool<G>) {
        if let Some(hooks) = self
            .slots
            .get_mut(id)
            .and_then(|entry| entry.hooks.as_mut())
        {
            hooks.on_asset_unloaded(pool);
        }
        self.notify_asset_changed(id, false);
    }

    /// Release GPU objects back to `pool` and drop every resource
    pub fn clear(&mut self, pool: &mut TexturePool<G>) {
        for (_, entry) in self.slots.iter_mut() {
            if let Some(hooks) = entry.hooks.as_mut() {
                hooks.on_asset_unloaded(pool);
            }
        }
        self.slots.clear();
    }
}

/// Snapshot of a resource's own asset
///
/// `Err(No)` after queueing a load when nothing is resident yet, `Err(Error)`
/// when the last load failed.
pub(crate) fn collect_asset_snapshot<D: AssetPayload, S: AsyncSpawner>(
    cache: &mut CustomAssetCache<S>,
    asset: &CustomAsset<D>,
) -> Result<AssetSnapshot<D>, TaskComplete> {
    if cache.has_errors(asset.handle()) {
        log::error!("Asset {} failed to load", asset.id());
        return Err(TaskComplete::Error);
    }
    match asset.get_data() {
        Some(snapshot) => Ok(snapshot),
        None => {
            cache.mark_asset_pending(asset.handle());
            Err(TaskComplete::No)
        }
    }
}

/// Running aggregate over the dependencies one resource requests
///
/// Every requested dependency is referenced, failed ones included, so a fix
/// to any of them invalidates the dependent.
pub(crate) struct DependencyCollector {
    dependent: ResourceId,
    status: TaskComplete,
}

impl DependencyCollector {
    pub fn new(dependent: ResourceId) -> Self {
        Self {
            dependent,
            status: TaskComplete::Yes,
        }
    }

    /// Reference `requested`. `None` means the aggregate is now `Error` and
    /// the caller should stop.
    pub fn track<G: GpuDevice, S: AsyncSpawner>(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        requested: crate::error::Result<ResourceId>,
    ) -> Option<ResourceId> {
        let dependency = match requested {
            Ok(dependency) => dependency,
            Err(err) => {
                log::error!("Failed to request dependency: {err}");
                self.status = TaskComplete::Error;
                return None;
            }
        };
        manager.add_reference(dependency, self.dependent);
        match manager.is_data_processed(dependency) {
            TaskComplete::Yes => {}
            TaskComplete::No => self.status = TaskComplete::No,
            TaskComplete::Error => {
                self.status = TaskComplete::Error;
                return None;
            }
        }
        Some(dependency)
    }

    pub fn status(&self) -> TaskComplete {
        self.status
    }
}

/// Background derivation owned by one resource
///
/// A reset moves the running request aside instead of cancelling it. Its
/// result may still be published if it lands before the fresh request's.
#[derive(Debug)]
pub(crate) struct CompileSlot<T> {
    current: Option<WorkHandle<T>>,
    superseded: Option<WorkHandle<T>>,
}

impl<T> Default for CompileSlot<T> {
    fn default() -> Self {
        Self {
            current: None,
            superseded: None,
        }
    }
}

impl<T> CompileSlot<T> {
    pub fn is_submitted(&self) -> bool {
        self.current.is_some()
    }

    pub fn submit(&mut self, work: WorkHandle<T>) {
        self.current = Some(work);
    }

    pub fn supersede(&mut self) {
        if let Some(work) = self.current.take() {
            self.superseded = Some(work);
        }
    }

    /// Result of the superseded request, once it has one
    pub fn take_superseded(&mut self) -> Option<T> {
        let poll = self.superseded.as_mut()?.try_take();
        match poll {
            WorkPoll::Pending => None,
            WorkPoll::Ready(value) => {
                self.superseded = None;
                Some(value)
            }
            WorkPoll::Lost => {
                self.superseded = None;
                None
            }
        }
    }

    /// Poll the current request. A finished request also retires the
    /// superseded one, so an older result never lands after a newer one.
    pub fn poll(&mut self) -> WorkPoll<T> {
        let Some(work) = self.current.as_mut() else {
            return WorkPoll::Lost;
        };
        let poll = work.try_take();
        if !matches!(poll, WorkPoll::Pending) {
            self.current = None;
            self.superseded = None;
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::mock::MockGpu;
    use crate::runtime::{spawn_work, MockSpawner};

    struct Inert;

    impl Resource<MockGpu, MockSpawner> for Inert {
        fn collect_primary_data(
            &mut self,
            _: &mut CustomResourceManager<MockGpu, MockSpawner>,
            _: ResourceId,
        ) -> TaskComplete {
            TaskComplete::Yes
        }

        fn process_data(
            &mut self,
            _: &mut CustomResourceManager<MockGpu, MockSpawner>,
            _: ResourceId,
        ) -> TaskComplete {
            TaskComplete::Yes
        }

        fn reset_data(&mut self) {}

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn arena_with(count: usize) -> (ResourceArena<MockGpu, MockSpawner>, Vec<ResourceId>) {
        let mut arena = ResourceArena::default();
        let ids = (0..count)
            .map(|i| arena.insert(AssetHandle::new(i as u32), Box::new(Inert)))
            .collect();
        (arena, ids)
    }

    #[test]
    fn test_failed_insert_claims_no_slot() {
        let mut arena = ResourceArena::<MockGpu, MockSpawner>::default();
        let failed = arena.try_insert(|_| Err("asset kind mismatch"));
        assert!(failed.is_err());
        assert_eq!(arena.len(), 0);

        let id = arena
            .try_insert::<()>(|_| {
                let hooks: Box<dyn Resource<MockGpu, MockSpawner>> = Box::new(Inert);
                Ok((AssetHandle::new(3), hooks))
            })
            .unwrap();
        assert_eq!(arena.core(id).unwrap().asset(), AssetHandle::new(3));
        assert!(arena.hooks::<Inert>(id).is_some());
    }

    #[test]
    fn test_references_are_symmetric() {
        let (mut arena, ids) = arena_with(2);
        arena.add_reference(ids[1], ids[0]);
        arena.add_reference(ids[1], ids[0]);

        assert_eq!(arena.core(ids[0]).unwrap().dependencies(), &[ids[1]]);
        assert!(arena.core(ids[1]).unwrap().dependents.contains(&ids[0]));

        arena.remove_references(ids[0]);
        assert!(arena.core(ids[0]).unwrap().dependencies().is_empty());
        assert!(arena.core(ids[1]).unwrap().dependents.is_empty());
    }

    #[test]
    fn test_invalidation_walks_cycles_once() {
        let (mut arena, ids) = arena_with(2);
        arena.add_reference(ids[0], ids[1]);
        arena.add_reference(ids[1], ids[0]);
        for &id in &ids {
            arena.core_mut(id).unwrap().state = ResourceState::DataAvailable;
        }

        arena.notify_asset_changed(ids[0], true);
        for &id in &ids {
            let core = arena.core(id).unwrap();
            assert_eq!(core.state(), ResourceState::ReloadData);
            assert_eq!(core.data_processed(), TaskComplete::Error);
        }
    }

    #[test]
    fn test_hooks_downcast() {
        let (arena, ids) = arena_with(1);
        assert!(arena.hooks::<Inert>(ids[0]).is_some());
        assert!(arena.hooks::<u32>(ids[0]).is_none());
    }

    #[test]
    fn test_compile_slot_retires_superseded_on_completion() {
        let spawner = MockSpawner::deferred();
        let mut slot = CompileSlot::default();

        slot.submit(spawn_work(&spawner, || 1));
        slot.supersede();
        assert!(!slot.is_submitted());
        slot.submit(spawn_work(&spawner, || 2));

        assert_eq!(slot.take_superseded(), None);
        assert_eq!(slot.poll(), WorkPoll::Pending);

        spawner.run_pending();
        assert_eq!(slot.poll(), WorkPoll::Ready(2));
        assert_eq!(slot.take_superseded(), None, "older result dropped");
    }

    #[test]
    fn test_compile_slot_superseded_result_lands_first() {
        let spawner = MockSpawner::deferred();
        let mut slot = CompileSlot::default();
        slot.submit(spawn_work(&spawner, || "old"));
        slot.supersede();

        spawner.run_pending();
        assert_eq!(slot.take_superseded(), Some("old"));
        assert_eq!(slot.poll(), WorkPoll::Lost, "nothing submitted yet");
    }
}

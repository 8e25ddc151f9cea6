//! Renderer-facing facade over the asset cache and the resource graph
//!
//! The manager owns the [`CustomAssetCache`], the [`TexturePool`] and the
//! arena every resource lives in. Renderers ask for resources by asset id
//! (plus the pipeline state they need) through the `get_*_from_asset`
//! methods; each call advances the resource's state machine as far as it can
//! without blocking and returns its stable [`ResourceId`]. Built data is read
//! back through the typed getters as `Arc` snapshots.
//!
//! # Example
//! ```ignore
//! let mut manager = CustomResourceManager::new(gpu, spawner, library, CacheConfig::default());
//! manager.initialize();
//! loop {
//!     let material = manager.get_material_from_asset("stone", PipelineUid::default())?;
//!     manager.mark_as_active(material);
//!     if let Some(data) = manager.material_data(material) {
//!         // draw with data.pipeline
//!     }
//!     manager.update();
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{AssetHandle, AssetListener, CustomAssetCache, DirtyAssetNotifier, TexturePool};
use crate::config::{CacheConfig, ShaderHostConfig};
use crate::error::Result;
use crate::gpu::{GpuDevice, GpuResult, TextureDescriptor, TextureKind};
use crate::library::{AssetId, AssetLibrary, AssetPayload, CustomAsset, TextureAssetData};
use crate::pipeline::{PipelineUid, ShaderVariant};
use crate::resource::material::{MaterialData, MaterialResource};
use crate::resource::mesh::{MeshData, MeshResource};
use crate::resource::render_target::RenderTargetResource;
use crate::resource::shader::{ShaderData, ShaderResource};
use crate::resource::texture::{TextureAndSamplerData, TextureAndSamplerResource, TextureDataResource};
use crate::resource::{
    Resource, ResourceArena, ResourceCore, ResourceId, ResourceState, TaskComplete,
};
use crate::runtime::AsyncSpawner;

/// Routes cache callbacks to the resources listening on an asset
struct ResourceNotifier<'a, G: GpuDevice, S: AsyncSpawner> {
    resources: &'a mut ResourceArena<G, S>,
    pool: &'a mut TexturePool<G>,
}

impl<G: GpuDevice, S: AsyncSpawner> AssetListener for ResourceNotifier<'_, G, S> {
    fn notify_asset_load_success(&mut self, listener: ResourceId, _asset: AssetHandle) {
        self.resources.notify_asset_changed(listener, false);
    }

    fn notify_asset_load_failed(&mut self, listener: ResourceId, _asset: AssetHandle) {
        self.resources.notify_asset_changed(listener, true);
    }

    fn asset_unloaded(&mut self, listener: ResourceId, _asset: AssetHandle) {
        self.resources.asset_unloaded(listener, self.pool);
    }
}

pub struct CustomResourceManager<G: GpuDevice, S: AsyncSpawner> {
    gpu: G,
    library: Arc<dyn AssetLibrary>,
    cache: CustomAssetCache<S>,
    pool: TexturePool<G>,
    resources: ResourceArena<G, S>,
    host_config: ShaderHostConfig,

    texture_data: HashMap<AssetId, ResourceId>,
    texture_samplers: HashMap<AssetId, ResourceId>,
    render_targets: HashMap<AssetId, ResourceId>,
    shaders: HashMap<(AssetId, ShaderVariant), ResourceId>,
    materials: HashMap<(AssetId, PipelineUid), ResourceId>,
    meshes: HashMap<(AssetId, PipelineUid), ResourceId>,

    /// One 1x1 white texture per sampler kind
    placeholders: HashMap<TextureKind, G::Texture>,
}

impl<G: GpuDevice, S: AsyncSpawner> std::fmt::Debug for CustomResourceManager<G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomResourceManager")
            .field("backend", &self.gpu.backend_name())
            .field("cache", &self.cache)
            .field("resources", &self.resources.len())
            .field("pooled_textures", &self.pool.free_count())
            .field("host_config", &self.host_config)
            .finish()
    }
}

impl<G: GpuDevice, S: AsyncSpawner> CustomResourceManager<G, S> {
    pub fn new(gpu: G, spawner: S, library: Arc<dyn AssetLibrary>, config: CacheConfig) -> Self {
        let host_config = ShaderHostConfig::from_capabilities(&gpu.capabilities());
        Self {
            gpu,
            library,
            cache: CustomAssetCache::new(spawner, config),
            pool: TexturePool::new(),
            resources: ResourceArena::default(),
            host_config,
            texture_data: HashMap::new(),
            texture_samplers: HashMap::new(),
            render_targets: HashMap::new(),
            shaders: HashMap::new(),
            materials: HashMap::new(),
            meshes: HashMap::new(),
            placeholders: HashMap::new(),
        }
    }

    pub fn initialize(&mut self) {
        self.reset();
        self.cache.initialize();
        log::info!(
            "Resource manager initialized on {} backend",
            self.gpu.backend_name()
        );
    }

    /// Per-frame step. Runs the cache update and delivers its callbacks.
    pub fn update(&mut self) {
        let mut notifier = ResourceNotifier {
            resources: &mut self.resources,
            pool: &mut self.pool,
        };
        self.cache.update(&mut notifier);
    }

    /// Drop every resource and asset. Textures go back to the pool.
    pub fn reset(&mut self) {
        self.resources.clear(&mut self.pool);
        self.texture_data.clear();
        self.texture_samplers.clear();
        self.render_targets.clear();
        self.shaders.clear();
        self.materials.clear();
        self.meshes.clear();
        for (_, texture) in self.placeholders.drain() {
            self.pool.release_texture(texture);
        }
        self.cache.reset();
    }

    /// Like [`reset`](Self::reset), then destroys the pooled textures
    pub fn shutdown(&mut self) {
        self.reset();
        self.pool.clear(&self.gpu);
        self.cache.shutdown();
        log::info!("Resource manager shut down");
    }

    /// Advance `id` through its pipeline as far as possible this frame
    ///
    /// Never blocks. Returns `Yes` once data is available, `No` while
    /// waiting on a load, a dependency or a worker, and `Error` while parked.
    pub fn process(&mut self, id: ResourceId) -> TaskComplete {
        let Some(core) = self.resources.core(id) else {
            return TaskComplete::Error;
        };
        let state = core.state;
        if state == ResourceState::DataAvailable {
            return TaskComplete::Yes;
        }
        if state != ResourceState::ReloadData && core.data_processed == TaskComplete::Error {
            return TaskComplete::Error;
        }

        // Re-entrant request from inside one of this resource's hooks.
        let Some(mut hooks) = self
            .resources
            .entry_mut(id)
            .and_then(|entry| entry.hooks.take())
        else {
            let Some(core) = self.resources.core_mut(id) else {
                return TaskComplete::Error;
            };
            if core.state == ResourceState::CollectingDependencyData {
                // Reached through its own dependencies: a cycle never resolves.
                log::error!("Resource {id:?} depends on itself through a cycle");
                core.data_processed = TaskComplete::Error;
            }
            return core.data_processed;
        };

        if state == ResourceState::ReloadData {
            if let Some(core) = self.resources.core_mut(id) {
                core.state = ResourceState::CollectingPrimaryData;
                core.data_processed = TaskComplete::No;
            }
            hooks.reset_data();
            self.resources.remove_references(id);
        }

        let result = self.run_hooks(id, hooks.as_mut());

        if let Some(entry) = self.resources.entry_mut(id) {
            entry.hooks = Some(hooks);
        }
        result
    }

    fn run_hooks(&mut self, id: ResourceId, hooks: &mut dyn Resource<G, S>) -> TaskComplete {
        loop {
            let Some(state) = self.resources.core(id).map(ResourceCore::state) else {
                return TaskComplete::Error;
            };
            let status = match state {
                ResourceState::CollectingPrimaryData => hooks.collect_primary_data(self, id),
                ResourceState::CollectingDependencyData => hooks.collect_dependency_data(self, id),
                ResourceState::ProcessingData => hooks.process_data(self, id),
                ResourceState::DataAvailable => return TaskComplete::Yes,
                ResourceState::ReloadData => {
                    return self
                        .resources
                        .core(id)
                        .map_or(TaskComplete::Error, ResourceCore::data_processed)
                }
            };

            let Some(core) = self.resources.core_mut(id) else {
                return TaskComplete::Error;
            };
            if core.state != state {
                // Invalidated while the hook ran; the next request starts over.
                return core.data_processed;
            }

            match status {
                TaskComplete::Yes => {
                    core.state = match state {
                        ResourceState::CollectingPrimaryData => {
                            ResourceState::CollectingDependencyData
                        }
                        ResourceState::CollectingDependencyData => ResourceState::ProcessingData,
                        _ => ResourceState::DataAvailable,
                    };
                    if core.state == ResourceState::DataAvailable {
                        core.data_processed = TaskComplete::Yes;
                        log::debug!("Resource {id:?} data available");
                        return TaskComplete::Yes;
                    }
                }
                TaskComplete::No => {
                    core.data_processed = TaskComplete::No;
                    return TaskComplete::No;
                }
                TaskComplete::Error => {
                    core.data_processed = TaskComplete::Error;
                    log::error!("Resource {id:?} failed while in {state:?}");
                    return TaskComplete::Error;
                }
            }
        }
    }

    /// Register the asset with the new resource as its listener, then store
    /// the hooks built from it
    fn create_resource<D, R, F>(&mut self, asset_id: &str, build: F) -> Result<ResourceId>
    where
        D: AssetPayload,
        R: Resource<G, S>,
        F: FnOnce(Arc<CustomAsset<D>>) -> R,
    {
        let cache = &mut self.cache;
        let library = &self.library;
        let id = self
            .resources
            .try_insert(|id| -> Result<(AssetHandle, Box<dyn Resource<G, S>>)> {
                let asset = cache.create_asset::<D>(asset_id, Arc::clone(library), Some(id))?;
                let handle = asset.handle();
                let hooks: Box<dyn Resource<G, S>> = Box::new(build(asset));
                Ok((handle, hooks))
            })?;
        log::debug!("Created {:?} resource {id:?} for asset {asset_id}", D::KIND);
        Ok(id)
    }

    pub fn get_texture_data_from_asset(&mut self, asset_id: &str) -> Result<ResourceId> {
        let id = match self.texture_data.get(asset_id) {
            Some(&id) => id,
            None => {
                let id = self.create_resource(asset_id, TextureDataResource::new)?;
                self.texture_data.insert(asset_id.to_string(), id);
                id
            }
        };
        self.process(id);
        Ok(id)
    }

    pub fn get_texture_and_sampler_from_asset(&mut self, asset_id: &str) -> Result<ResourceId> {
        let id = match self.texture_samplers.get(asset_id) {
            Some(&id) => id,
            None => {
                let id = self.create_resource(asset_id, TextureAndSamplerResource::<G>::new)?;
                self.texture_samplers.insert(asset_id.to_string(), id);
                id
            }
        };
        self.process(id);
        Ok(id)
    }

    pub fn get_render_target_from_asset(&mut self, asset_id: &str) -> Result<ResourceId> {
        let id = match self.render_targets.get(asset_id) {
            Some(&id) => id,
            None => {
                let id = self.create_resource(asset_id, RenderTargetResource::<G>::new)?;
                self.render_targets.insert(asset_id.to_string(), id);
                id
            }
        };
        self.process(id);
        Ok(id)
    }

    pub fn get_shader_from_asset(
        &mut self,
        asset_id: &str,
        variant: ShaderVariant,
    ) -> Result<ResourceId> {
        let key = (asset_id.to_string(), variant);
        let id = match self.shaders.get(&key) {
            Some(&id) => id,
            None => {
                let host_config = self.host_config;
                let variant = key.1.clone();
                let id = self.create_resource(asset_id, |asset| {
                    ShaderResource::<G>::new(asset, variant, host_config)
                })?;
                self.shaders.insert(key, id);
                id
            }
        };
        self.process(id);
        Ok(id)
    }

    pub fn get_material_from_asset(
        &mut self,
        asset_id: &str,
        uid: PipelineUid,
    ) -> Result<ResourceId> {
        let key = (asset_id.to_string(), uid);
        let id = match self.materials.get(&key) {
            Some(&id) => id,
            None => {
                let uid = key.1.clone();
                let id = self.create_resource(asset_id, |asset| {
                    MaterialResource::<G>::new(asset, uid)
                })?;
                self.materials.insert(key, id);
                id
            }
        };
        self.process(id);
        Ok(id)
    }

    pub fn get_mesh_from_asset(&mut self, asset_id: &str, uid: PipelineUid) -> Result<ResourceId> {
        let key = (asset_id.to_string(), uid);
        let id = match self.meshes.get(&key) {
            Some(&id) => id,
            None => {
                let uid = key.1.clone();
                let id =
                    self.create_resource(asset_id, |asset| MeshResource::<G>::new(asset, uid))?;
                self.meshes.insert(key, id);
                id
            }
        };
        self.process(id);
        Ok(id)
    }

    /// Last status recorded for `id`. Does not advance the pipeline.
    pub fn is_data_processed(&self, id: ResourceId) -> TaskComplete {
        self.resources
            .core(id)
            .map_or(TaskComplete::Error, ResourceCore::data_processed)
    }

    pub fn state(&self, id: ResourceId) -> Option<ResourceState> {
        self.resources.core(id).map(ResourceCore::state)
    }

    pub fn resource_core(&self, id: ResourceId) -> Option<&ResourceCore> {
        self.resources.core(id)
    }

    /// Concrete hooks of `id`, `None` while they are running
    pub fn resource<T: 'static>(&self, id: ResourceId) -> Option<&T> {
        self.resources.hooks::<T>(id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn texture_data(&self, id: ResourceId) -> Option<Arc<TextureAssetData>> {
        self.resource::<TextureDataResource>(id)?.data()
    }

    pub fn texture_and_sampler_data(&self, id: ResourceId) -> Option<Arc<TextureAndSamplerData<G>>> {
        self.resource::<TextureAndSamplerResource<G>>(id)?.data()
    }

    pub fn render_target_data(&self, id: ResourceId) -> Option<Arc<TextureAndSamplerData<G>>> {
        self.resource::<RenderTargetResource<G>>(id)?.data()
    }

    /// Data of a texture-and-sampler or render target resource
    pub fn sampled_texture_data(&self, id: ResourceId) -> Option<Arc<TextureAndSamplerData<G>>> {
        self.texture_and_sampler_data(id)
            .or_else(|| self.render_target_data(id))
    }

    pub fn shader_data(&self, id: ResourceId) -> Option<Arc<ShaderData<G>>> {
        self.resource::<ShaderResource<G>>(id)?.data()
    }

    pub fn material_data(&self, id: ResourceId) -> Option<Arc<MaterialData<G>>> {
        self.resource::<MaterialResource<G>>(id)?.data()
    }

    pub fn mesh_data(&self, id: ResourceId) -> Option<Arc<MeshData<G>>> {
        self.resource::<MeshResource<G>>(id)?.data()
    }

    /// Assets of `root` and of everything it transitively depends on
    fn dependency_assets(&self, root: ResourceId) -> Vec<AssetHandle> {
        let mut assets = Vec::new();
        let mut stack = vec![root];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(core) = self.resources.core(id) {
                assets.push(core.asset());
                stack.extend(core.dependencies().iter().copied());
            }
        }
        assets
    }

    /// Keep `id` and its dependencies resident; call once per frame for
    /// everything drawn
    pub fn mark_as_active(&mut self, id: ResourceId) {
        for asset in self.dependency_assets(id) {
            self.cache.mark_asset_active(asset);
        }
    }

    /// Request loads for `id` and its dependencies without drawing them
    pub fn mark_as_pending(&mut self, id: ResourceId) {
        for asset in self.dependency_assets(id) {
            self.cache.mark_asset_pending(asset);
        }
    }

    pub fn add_reference(&mut self, dependency: ResourceId, dependent: ResourceId) {
        self.resources.add_reference(dependency, dependent);
    }

    pub fn remove_reference(&mut self, dependency: ResourceId, dependent: ResourceId) {
        self.resources.remove_reference(dependency, dependent);
    }

    /// Invalidate `id` and everything depending on it
    pub fn notify_asset_changed(&mut self, id: ResourceId, error: bool) {
        self.resources.notify_asset_changed(id, error);
    }

    pub fn host_config(&self) -> ShaderHostConfig {
        self.host_config
    }

    /// Recompile the shaders built for a different configuration. Ids stay
    /// valid.
    pub fn set_host_config(&mut self, config: ShaderHostConfig) {
        self.host_config = config;
        let shaders: Vec<ResourceId> = self.shaders.values().copied().collect();
        let mut invalidated = 0;
        for id in shaders {
            let changed = self
                .resources
                .hooks_mut::<ShaderResource<G>>(id)
                .is_some_and(|shader| shader.set_host_config(config));
            if changed {
                self.resources.notify_asset_changed(id, false);
                invalidated += 1;
            }
        }
        log::debug!("Host config changed, {invalidated} shader(s) invalidated");
    }

    /// Shared fallback texture for an unbound or mismatched sampler slot
    pub fn placeholder_texture(&mut self, kind: TextureKind) -> GpuResult<G::Texture> {
        if let Some(texture) = self.placeholders.get(&kind) {
            return Ok(texture.clone());
        }

        let desc = TextureDescriptor {
            layers: if kind == TextureKind::Cubemap { 6 } else { 1 },
            kind,
            ..Default::default()
        };
        let texture = self.pool.allocate_texture(&self.gpu, &desc)?;
        for layer in 0..desc.layers {
            self.gpu.upload_texture(&texture, 0, layer, &[255; 4])?;
        }
        self.placeholders.insert(kind, texture.clone());
        Ok(texture)
    }

    pub fn allocate_texture(&mut self, desc: &TextureDescriptor) -> GpuResult<G::Texture> {
        self.pool.allocate_texture(&self.gpu, desc)
    }

    pub fn release_texture(&mut self, texture: G::Texture) {
        self.pool.release_texture(texture);
    }

    pub fn mark_asset_dirty(&self, asset_id: impl Into<AssetId>) {
        self.cache.mark_asset_dirty(asset_id);
    }

    pub fn dirty_notifier(&self) -> DirtyAssetNotifier {
        self.cache.dirty_notifier()
    }

    pub fn cache(&self) -> &CustomAssetCache<S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut CustomAssetCache<S> {
        &mut self.cache
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn spawner(&self) -> &S {
        self.cache.spawner()
    }

    pub fn pool(&self) -> &TexturePool<G> {
        &self.pool
    }

    pub fn library(&self) -> &Arc<dyn AssetLibrary> {
        &self.library
    }
}

//! Material resource
//!
//! A material depends on a shader variant, the textures or render targets
//! bound to its sampler slots and optionally a follow-up material drawn in a
//! second pass. Once all of them are available the pipeline is linked on the
//! spawner and published together with the resolved bindings.

use std::any::Any;
use std::sync::Arc;

use super::texture::TextureAndSamplerData;
use super::{
    collect_asset_snapshot, CompileSlot, DependencyCollector, Resource, ResourceId, TaskComplete,
};
use crate::gpu::{GpuDevice, GpuResult, PipelineDescriptor, TextureKind};
use crate::library::{AssetSnapshot, CustomAsset, MaterialAssetData, SamplerState, TextureSource};
use crate::manager::CustomResourceManager;
use crate::pipeline::{PipelineUid, ShaderVariant};
use crate::runtime::{spawn_work, AsyncSpawner, WorkPoll};

/// Texture bound to one sampler slot
#[derive(Debug)]
pub struct MaterialTexture<G: GpuDevice> {
    pub texture: G::Texture,
    pub sampler: SamplerState,
    pub kind: TextureKind,
    /// Filled with a fallback because nothing usable was bound
    pub is_placeholder: bool,
}

#[derive(Debug)]
pub struct MaterialData<G: GpuDevice> {
    pub pipeline: G::Pipeline,
    /// Pipeline description after the material's own overrides
    pub uid: PipelineUid,
    pub variant_key: u64,
    pub shader: ResourceId,
    pub textures: Vec<MaterialTexture<G>>,
    pub uniform_data: Vec<u8>,
    pub next_material: Option<ResourceId>,
}

impl<G: GpuDevice> MaterialData<G> {
    pub fn pipeline(&self) -> &G::Pipeline {
        &self.pipeline
    }

    pub fn textures(&self) -> &[MaterialTexture<G>] {
        &self.textures
    }

    pub fn next_material(&self) -> Option<ResourceId> {
        self.next_material
    }
}

/// Apply a material's fixed-function overrides to the requested pipeline
pub fn apply_overrides(requested: &PipelineUid, material: &MaterialAssetData) -> PipelineUid {
    let mut uid = requested.clone();
    if let Some(blend) = material.blend {
        uid.blend = blend;
    }
    if let Some(cull_mode) = material.cull_mode {
        uid.cull_mode = cull_mode;
    }
    if let Some(depth) = material.depth {
        uid.depth = depth;
    }
    uid
}

struct MaterialLoad {
    snapshot: AssetSnapshot<MaterialAssetData>,
    uid: PipelineUid,
    variant: ShaderVariant,
    shader: Option<ResourceId>,
    textures: Vec<Option<ResourceId>>,
    next_material: Option<ResourceId>,
}

pub struct MaterialResource<G: GpuDevice> {
    asset: Arc<CustomAsset<MaterialAssetData>>,
    requested_uid: PipelineUid,
    load: Option<MaterialLoad>,
    compile: CompileSlot<GpuResult<MaterialData<G>>>,
    current: Option<Arc<MaterialData<G>>>,
}

impl<G: GpuDevice> MaterialResource<G> {
    pub(crate) fn new(asset: Arc<CustomAsset<MaterialAssetData>>, requested_uid: PipelineUid) -> Self {
        Self {
            asset,
            requested_uid,
            load: None,
            compile: CompileSlot::default(),
            current: None,
        }
    }

    pub fn data(&self) -> Option<Arc<MaterialData<G>>> {
        self.current.clone()
    }

    pub fn requested_uid(&self) -> &PipelineUid {
        &self.requested_uid
    }

    fn bind_slot<S: AsyncSpawner>(
        &self,
        manager: &mut CustomResourceManager<G, S>,
        load: &MaterialLoad,
        slot: usize,
        declared: Option<TextureKind>,
    ) -> GpuResult<MaterialTexture<G>> {
        let binding = load.snapshot.data.textures.get(slot);
        let bound: Option<Arc<TextureAndSamplerData<G>>> = load
            .textures
            .get(slot)
            .copied()
            .flatten()
            .and_then(|dependency| manager.sampled_texture_data(dependency));
        let sampler_override = binding.and_then(|b| b.sampler_override);

        if let Some(bound) = bound {
            let kind = bound.descriptor.kind;
            if declared.map_or(true, |declared| declared == kind) {
                return Ok(MaterialTexture {
                    texture: bound.texture.clone(),
                    sampler: sampler_override.unwrap_or(bound.sampler),
                    kind,
                    is_placeholder: false,
                });
            }
            log::warn!(
                "Material {} binds a {kind:?} to slot {slot}, shader samples {:?}; using a placeholder",
                self.asset.id(),
                declared
            );
        }

        let kind = declared.unwrap_or_default();
        Ok(MaterialTexture {
            texture: manager.placeholder_texture(kind)?,
            sampler: sampler_override.unwrap_or_default(),
            kind,
            is_placeholder: true,
        })
    }

    /// Resolve bindings and start linking the pipeline
    fn submit_pipeline<S: AsyncSpawner>(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
    ) -> TaskComplete {
        let Some(load) = self.load.as_ref() else {
            return TaskComplete::Error;
        };
        let Some(shader_id) = load.shader else {
            return TaskComplete::Error;
        };
        let Some(shader) = manager.shader_data(shader_id) else {
            log::error!("Shader for material {} has no data", self.asset.id());
            return TaskComplete::Error;
        };
        let (Some(vertex_shader), Some(pixel_shader)) = (shader.vertex.clone(), shader.pixel.clone())
        else {
            log::error!("Shader for material {} is not compiled", self.asset.id());
            return TaskComplete::Error;
        };

        let slot_count = load.snapshot.data.textures.len().max(shader.samplers.len());
        let mut textures = Vec::with_capacity(slot_count);
        for slot in 0..slot_count {
            match self.bind_slot(manager, load, slot, shader.sampler_kind(slot)) {
                Ok(texture) => textures.push(texture),
                Err(err) => {
                    log::error!("Failed to bind slot {slot} of material {}: {err}", self.asset.id());
                    return TaskComplete::Error;
                }
            }
        }

        let descriptor = PipelineDescriptor {
            vertex_shader,
            pixel_shader,
            geometry_shader: shader.geometry.clone(),
            uid: load.uid.clone(),
            sampler_count: textures.len(),
        };
        let variant_key = load.variant.key();
        let uniform_data = load.snapshot.data.uniform_data.clone();
        let next_material = load.next_material;
        let gpu = manager.gpu().clone();

        log::debug!(
            "Linking pipeline for material {} variant {variant_key:#x}",
            self.asset.id()
        );
        self.compile.submit(spawn_work(
            manager.spawner(),
            move || -> GpuResult<MaterialData<G>> {
                let pipeline = gpu.create_pipeline(&descriptor)?;
                Ok(MaterialData {
                    pipeline,
                    uid: descriptor.uid,
                    variant_key,
                    shader: shader_id,
                    textures,
                    uniform_data,
                    next_material,
                })
            },
        ));
        TaskComplete::Yes
    }
}

impl<G: GpuDevice, S: AsyncSpawner> Resource<G, S> for MaterialResource<G> {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let snapshot = match collect_asset_snapshot(manager.cache_mut(), &self.asset) {
            Ok(snapshot) => snapshot,
            Err(status) => return status,
        };
        let data = &snapshot.data;
        if data.shader_asset.is_empty() {
            log::error!("Material {} has no shader", self.asset.id());
            return TaskComplete::Error;
        }
        if data.next_material_asset == self.asset.id() {
            log::error!("Material {} chains to itself", self.asset.id());
            return TaskComplete::Error;
        }

        let uid = apply_overrides(&self.requested_uid, data);
        let has_sampler = data.textures.iter().map(|slot| slot.is_bound()).collect();
        let variant = ShaderVariant::new(uid.clone(), has_sampler);
        let slot_count = data.textures.len();
        self.load = Some(MaterialLoad {
            snapshot,
            uid,
            variant,
            shader: None,
            textures: vec![None; slot_count],
            next_material: None,
        });
        TaskComplete::Yes
    }

    fn collect_dependency_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        id: ResourceId,
    ) -> TaskComplete {
        let Some(load) = self.load.as_mut() else {
            return TaskComplete::Error;
        };
        let data = Arc::clone(&load.snapshot.data);
        let mut dependencies = DependencyCollector::new(id);

        let requested = manager.get_shader_from_asset(&data.shader_asset, load.variant.clone());
        let Some(shader) = dependencies.track(manager, requested) else {
            return TaskComplete::Error;
        };
        load.shader = Some(shader);

        for (slot, binding) in data.textures.iter().enumerate() {
            if !binding.is_bound() {
                continue;
            }
            let requested = match binding.source {
                TextureSource::Texture => manager.get_texture_and_sampler_from_asset(&binding.asset_id),
                TextureSource::RenderTarget => manager.get_render_target_from_asset(&binding.asset_id),
            };
            let Some(texture) = dependencies.track(manager, requested) else {
                return TaskComplete::Error;
            };
            load.textures[slot] = Some(texture);
        }

        if !data.next_material_asset.is_empty() {
            let requested = manager.get_material_from_asset(&data.next_material_asset, load.uid.clone());
            let Some(next) = dependencies.track(manager, requested) else {
                return TaskComplete::Error;
            };
            load.next_material = Some(next);
        }

        dependencies.status()
    }

    fn process_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        if let Some(Ok(stale)) = self.compile.take_superseded() {
            self.current = Some(Arc::new(stale));
        }

        if !self.compile.is_submitted() {
            let submitted = self.submit_pipeline(manager);
            if submitted != TaskComplete::Yes {
                return submitted;
            }
        }

        match self.compile.poll() {
            WorkPoll::Pending => TaskComplete::No,
            WorkPoll::Ready(Ok(data)) => {
                self.current = Some(Arc::new(data));
                TaskComplete::Yes
            }
            WorkPoll::Ready(Err(err)) => {
                log::error!("Failed to create pipeline for material {}: {err}", self.asset.id());
                TaskComplete::Error
            }
            WorkPoll::Lost => {
                log::error!("Pipeline creation for material {} was dropped", self.asset.id());
                TaskComplete::Error
            }
        }
    }

    fn reset_data(&mut self) {
        self.load = None;
        self.compile.supersede();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BlendMode, CullMode};

    #[test]
    fn test_overrides_replace_only_set_fields() {
        let requested = PipelineUid {
            cull_mode: CullMode::Front,
            ..Default::default()
        };
        let material = MaterialAssetData {
            shader_asset: "shader".into(),
            blend: Some(BlendMode::AlphaBlend),
            ..Default::default()
        };

        let uid = apply_overrides(&requested, &material);
        assert_eq!(uid.blend, BlendMode::AlphaBlend);
        assert_eq!(uid.cull_mode, CullMode::Front);
        assert_eq!(uid.depth, requested.depth);
    }
}

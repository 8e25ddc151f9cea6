//! Shader resource
//!
//! One resource per (shader asset, variant). The variant's `HAS_SAMPLER_n`
//! flags and the host configuration are prepended to each stage as defines,
//! then all stages compile on the spawner.

use std::any::Any;
use std::sync::Arc;

use super::{collect_asset_snapshot, CompileSlot, Resource, ResourceId, TaskComplete};
use crate::config::ShaderHostConfig;
use crate::gpu::{GpuDevice, GpuResult, ShaderStage, TextureKind};
use crate::library::{AssetSnapshot, CustomAsset, ShaderAssetData, ShaderSampler};
use crate::manager::CustomResourceManager;
use crate::pipeline::ShaderVariant;
use crate::runtime::{spawn_work, AsyncSpawner, WorkPoll};

/// Compiled stages of one shader variant
#[derive(Debug)]
pub struct ShaderData<G: GpuDevice> {
    pub vertex: Option<G::Shader>,
    pub pixel: Option<G::Shader>,
    pub geometry: Option<G::Shader>,
    /// Whether a geometry stage was requested for this host
    pub requires_geometry: bool,
    pub samplers: Vec<ShaderSampler>,
    pub variant_key: u64,
    pub host_config: ShaderHostConfig,
}

impl<G: GpuDevice> ShaderData<G> {
    /// All required stages are present
    pub fn is_compiled(&self) -> bool {
        self.vertex.is_some()
            && self.pixel.is_some()
            && (!self.requires_geometry || self.geometry.is_some())
    }

    /// Texture kind the shader samples at `slot`
    pub fn sampler_kind(&self, slot: usize) -> Option<TextureKind> {
        self.samplers.get(slot).map(|sampler| sampler.kind)
    }
}

pub struct ShaderResource<G: GpuDevice> {
    asset: Arc<CustomAsset<ShaderAssetData>>,
    variant: ShaderVariant,
    host_config: ShaderHostConfig,
    load: Option<AssetSnapshot<ShaderAssetData>>,
    compile: CompileSlot<GpuResult<ShaderData<G>>>,
    current: Option<Arc<ShaderData<G>>>,
}

impl<G: GpuDevice> ShaderResource<G> {
    pub(crate) fn new(
        asset: Arc<CustomAsset<ShaderAssetData>>,
        variant: ShaderVariant,
        host_config: ShaderHostConfig,
    ) -> Self {
        Self {
            asset,
            variant,
            host_config,
            load: None,
            compile: CompileSlot::default(),
            current: None,
        }
    }

    pub fn data(&self) -> Option<Arc<ShaderData<G>>> {
        self.current.clone()
    }

    pub fn variant(&self) -> &ShaderVariant {
        &self.variant
    }

    pub fn host_config(&self) -> ShaderHostConfig {
        self.host_config
    }

    /// Returns whether the stored configuration changed
    pub(crate) fn set_host_config(&mut self, config: ShaderHostConfig) -> bool {
        if self.host_config == config {
            return false;
        }
        self.host_config = config;
        true
    }

    fn header(&self) -> String {
        let mut header = self.host_config.defines();
        for define in self.variant.defines() {
            header.push_str(&format!("#define {define} 1\n"));
        }
        header
    }
}

fn compile_stages<G: GpuDevice>(
    gpu: &G,
    header: &str,
    source: &ShaderAssetData,
    requires_geometry: bool,
) -> GpuResult<(G::Shader, G::Shader, Option<G::Shader>)> {
    let compile =
        |stage, body: &str| gpu.create_shader_from_source(stage, &format!("{header}{body}"));

    let vertex = compile(ShaderStage::Vertex, &source.vertex_source)?;
    let pixel = compile(ShaderStage::Pixel, &source.pixel_source)?;
    let geometry = match (&source.geometry_source, requires_geometry) {
        (Some(body), true) => Some(compile(ShaderStage::Geometry, body)?),
        _ => None,
    };
    Ok((vertex, pixel, geometry))
}

impl<G: GpuDevice, S: AsyncSpawner> Resource<G, S> for ShaderResource<G> {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let snapshot = match collect_asset_snapshot(manager.cache_mut(), &self.asset) {
            Ok(snapshot) => snapshot,
            Err(status) => return status,
        };
        if snapshot.data.vertex_source.trim().is_empty()
            || snapshot.data.pixel_source.trim().is_empty()
        {
            log::error!("Shader {} is missing a vertex or pixel stage", self.asset.id());
            return TaskComplete::Error;
        }
        self.load = Some(snapshot);
        TaskComplete::Yes
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
            let Some(snapshot) = self.load.as_ref() else {
                return TaskComplete::Error;
            };
            let gpu = manager.gpu().clone();
            let source = Arc::clone(&snapshot.data);
            let header = self.header();
            let host_config = self.host_config;
            let requires_geometry = source.geometry_source.is_some() && host_config.geometry_shaders;
            let variant_key = self.variant.key();

            log::debug!("Compiling shader {} variant {variant_key:#x}", self.asset.id());
            self.compile.submit(spawn_work(manager.spawner(), move || -> GpuResult<ShaderData<G>> {
                let (vertex, pixel, geometry) =
                    compile_stages(&gpu, &header, &source, requires_geometry)?;
                Ok(ShaderData {
                    vertex: Some(vertex),
                    pixel: Some(pixel),
                    geometry,
                    requires_geometry,
                    samplers: source.samplers.clone(),
                    variant_key,
                    host_config,
                })
            }));
        }

        match self.compile.poll() {
            WorkPoll::Pending => TaskComplete::No,
            WorkPoll::Ready(Ok(data)) if data.is_compiled() => {
                self.current = Some(Arc::new(data));
                TaskComplete::Yes
            }
            WorkPoll::Ready(Ok(_)) => {
                log::error!("Shader {} is missing a required stage", self.asset.id());
                TaskComplete::Error
            }
            WorkPoll::Ready(Err(err)) => {
                log::error!("Failed to compile shader {}: {err}", self.asset.id());
                TaskComplete::Error
            }
            WorkPoll::Lost => {
                log::error!("Compile of shader {} was dropped", self.asset.id());
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

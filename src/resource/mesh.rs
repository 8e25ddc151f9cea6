//! Mesh resource
//!
//! Geometry is split into chunks. Each chunk names its material; the mesh
//! asset maps those names to material assets. Besides the default chunk set a
//! mesh can carry replacement sets for individual draw calls (skinned
//! variants). Every chunk derives its own pipeline key from its vertex layout
//! and topology, so the same material asset may yield several material
//! resources.

use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{collect_asset_snapshot, DependencyCollector, Resource, ResourceId, TaskComplete};
use crate::gpu::{BufferUsage, GpuDevice, GpuResult};
use crate::library::{AssetSnapshot, CustomAsset, MeshAssetData, MeshChunkAssetData};
use crate::manager::CustomResourceManager;
use crate::pipeline::{PipelineUid, PrimitiveType};
use crate::runtime::AsyncSpawner;

#[derive(Debug)]
pub struct MeshChunk<G: GpuDevice> {
    pub vertex_buffer: G::Buffer,
    /// `None` for non-indexed chunks
    pub index_buffer: Option<G::Buffer>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub primitive: PrimitiveType,
    pub uid: PipelineUid,
    pub material: ResourceId,
}

#[derive(Debug)]
pub struct MeshData<G: GpuDevice> {
    pub chunks: Vec<MeshChunk<G>>,
    pub skinned_chunks: BTreeMap<u64, Vec<MeshChunk<G>>>,
}

impl<G: GpuDevice> MeshData<G> {
    /// Chunks to draw for `draw_call`, falling back to the default set
    pub fn chunks_for(&self, draw_call: Option<u64>) -> &[MeshChunk<G>] {
        draw_call
            .and_then(|id| self.skinned_chunks.get(&id))
            .unwrap_or(&self.chunks)
    }
}

struct MeshLoad {
    snapshot: AssetSnapshot<MeshAssetData>,
    materials: Vec<Option<ResourceId>>,
    skinned_materials: BTreeMap<u64, Vec<Option<ResourceId>>>,
}

pub struct MeshResource<G: GpuDevice> {
    asset: Arc<CustomAsset<MeshAssetData>>,
    uid: PipelineUid,
    load: Option<MeshLoad>,
    current: Option<Arc<MeshData<G>>>,
    _gpu: PhantomData<fn() -> G>,
}

impl<G: GpuDevice> MeshResource<G> {
    pub(crate) fn new(asset: Arc<CustomAsset<MeshAssetData>>, uid: PipelineUid) -> Self {
        Self {
            asset,
            uid,
            load: None,
            current: None,
            _gpu: PhantomData,
        }
    }

    pub fn data(&self) -> Option<Arc<MeshData<G>>> {
        self.current.clone()
    }

    /// Request the material of every chunk in `chunks`
    fn collect_chunk_materials<S: AsyncSpawner>(
        &self,
        manager: &mut CustomResourceManager<G, S>,
        dependencies: &mut DependencyCollector,
        data: &MeshAssetData,
        chunks: &[MeshChunkAssetData],
        resolved: &mut [Option<ResourceId>],
    ) -> bool {
        for (chunk, slot) in chunks.iter().zip(resolved.iter_mut()) {
            let Some(material_asset) = data.material_assets.get(&chunk.material_name) else {
                return false;
            };
            let uid = self
                .uid
                .with_geometry(&chunk.vertex_declaration, chunk.primitive);
            let requested = manager.get_material_from_asset(material_asset, uid);
            match dependencies.track(manager, requested) {
                Some(material) => *slot = Some(material),
                None => return false,
            }
        }
        true
    }

    fn upload_chunk(
        &self,
        gpu: &G,
        chunk: &MeshChunkAssetData,
        material: Option<ResourceId>,
    ) -> GpuResult<MeshChunk<G>> {
        let material = material.ok_or_else(|| {
            crate::gpu::GpuError::AllocationFailed(format!(
                "chunk of mesh {} has no material",
                self.asset.id()
            ))
        })?;

        let vertex_buffer = gpu.allocate_buffer(chunk.vertex_data.len(), BufferUsage::Vertex)?;
        gpu.upload_buffer_data(&vertex_buffer, 0, &chunk.vertex_data)?;

        let index_buffer = if chunk.indices.is_empty() {
            None
        } else {
            let bytes: Vec<u8> = chunk.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
            let buffer = gpu.allocate_buffer(bytes.len(), BufferUsage::Index)?;
            gpu.upload_buffer_data(&buffer, 0, &bytes)?;
            Some(buffer)
        };

        Ok(MeshChunk {
            vertex_buffer,
            index_buffer,
            vertex_count: chunk.vertex_count() as u32,
            index_count: chunk.indices.len() as u32,
            primitive: chunk.primitive,
            uid: self
                .uid
                .with_geometry(&chunk.vertex_declaration, chunk.primitive),
            material,
        })
    }

    fn upload_set(
        &self,
        gpu: &G,
        chunks: &[MeshChunkAssetData],
        materials: &[Option<ResourceId>],
    ) -> GpuResult<Vec<MeshChunk<G>>> {
        chunks
            .iter()
            .zip(materials)
            .map(|(chunk, material)| self.upload_chunk(gpu, chunk, *material))
            .collect()
    }
}

fn validate(id: &str, data: &MeshAssetData) -> bool {
    if data.chunks.is_empty() && data.skinned_chunks.is_empty() {
        log::error!("Mesh {id} has no chunks");
        return false;
    }
    for chunk in data.chunks.iter().chain(data.skinned_chunks.values().flatten()) {
        if !data.material_assets.contains_key(&chunk.material_name) {
            log::error!(
                "Mesh {id} uses material '{}' which it does not map to an asset",
                chunk.material_name
            );
            return false;
        }
        if chunk.vertex_count() == 0 {
            log::error!("Mesh {id} has a chunk without vertices");
            return false;
        }
    }
    true
}

impl<G: GpuDevice, S: AsyncSpawner> Resource<G, S> for MeshResource<G> {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let snapshot = match collect_asset_snapshot(manager.cache_mut(), &self.asset) {
            Ok(snapshot) => snapshot,
            Err(status) => return status,
        };
        if !validate(self.asset.id(), &snapshot.data) {
            return TaskComplete::Error;
        }

        let materials = vec![None; snapshot.data.chunks.len()];
        let skinned_materials = snapshot
            .data
            .skinned_chunks
            .iter()
            .map(|(&draw_call, chunks)| (draw_call, vec![None; chunks.len()]))
            .collect();
        self.load = Some(MeshLoad {
            snapshot,
            materials,
            skinned_materials,
        });
        TaskComplete::Yes
    }

    fn collect_dependency_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        id: ResourceId,
    ) -> TaskComplete {
        let Some(mut load) = self.load.take() else {
            return TaskComplete::Error;
        };
        let data = Arc::clone(&load.snapshot.data);
        let mut dependencies = DependencyCollector::new(id);

        let mut resolved =
            self.collect_chunk_materials(manager, &mut dependencies, &data, &data.chunks, &mut load.materials);
        for (draw_call, chunks) in &data.skinned_chunks {
            if !resolved {
                break;
            }
            if let Some(slots) = load.skinned_materials.get_mut(draw_call) {
                resolved =
                    self.collect_chunk_materials(manager, &mut dependencies, &data, chunks, slots);
            }
        }
        self.load = Some(load);

        if !resolved {
            return TaskComplete::Error;
        }
        dependencies.status()
    }

    fn process_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let Some(load) = self.load.as_ref() else {
            return TaskComplete::Error;
        };
        let data = &load.snapshot.data;
        let gpu = manager.gpu();

        let built = self.upload_set(gpu, &data.chunks, &load.materials).and_then(|chunks| {
            let mut skinned_chunks = BTreeMap::new();
            for (draw_call, set) in &data.skinned_chunks {
                let materials = load
                    .skinned_materials
                    .get(draw_call)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                skinned_chunks.insert(*draw_call, self.upload_set(gpu, set, materials)?);
            }
            Ok(MeshData {
                chunks,
                skinned_chunks,
            })
        });

        match built {
            Ok(mesh) => {
                self.current = Some(Arc::new(mesh));
                TaskComplete::Yes
            }
            Err(err) => {
                log::error!("Failed to upload mesh {}: {err}", self.asset.id());
                TaskComplete::Error
            }
        }
    }

    fn reset_data(&mut self) {
        self.load = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

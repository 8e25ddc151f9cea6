//! Texture resources
//!
//! [`TextureDataResource`] republishes the decoded CPU texture.
//! [`TextureAndSamplerResource`] uploads it into a pooled GPU texture and
//! pairs it with the sampler the asset declares.

use std::any::Any;
use std::sync::Arc;

use super::{collect_asset_snapshot, Resource, ResourceId, TaskComplete};
use crate::cache::TexturePool;
use crate::gpu::{GpuDevice, TextureDescriptor, TextureUsage};
use crate::library::{AssetSnapshot, CustomAsset, SamplerState, TextureAssetData};
use crate::manager::CustomResourceManager;
use crate::runtime::AsyncSpawner;

/// A GPU texture ready to bind, with its sampler
#[derive(Debug)]
pub struct TextureAndSamplerData<G: GpuDevice> {
    pub texture: G::Texture,
    pub sampler: SamplerState,
    pub descriptor: TextureDescriptor,
}

impl<G: GpuDevice> TextureAndSamplerData<G> {
    pub fn texture(&self) -> &G::Texture {
        &self.texture
    }

    pub fn sampler(&self) -> &SamplerState {
        &self.sampler
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }
}

/// Descriptor of the GPU texture that holds `data`, taken from the first
/// level of the first slice
pub fn texture_descriptor(data: &TextureAssetData) -> Option<TextureDescriptor> {
    let first_slice = data.slices.first()?;
    let first_level = first_slice.levels.first()?;
    Some(TextureDescriptor {
        width: first_level.width,
        height: first_level.height,
        layers: data.slices.len() as u32,
        mip_levels: first_slice.levels.len() as u32,
        format: first_level.format,
        kind: data.kind,
        usage: TextureUsage::Sampled,
    })
}

pub struct TextureDataResource {
    asset: Arc<CustomAsset<TextureAssetData>>,
    load: Option<AssetSnapshot<TextureAssetData>>,
    current: Option<Arc<TextureAssetData>>,
}

impl TextureDataResource {
    pub(crate) fn new(asset: Arc<CustomAsset<TextureAssetData>>) -> Self {
        Self {
            asset,
            load: None,
            current: None,
        }
    }

    pub fn data(&self) -> Option<Arc<TextureAssetData>> {
        self.current.clone()
    }
}

impl<G: GpuDevice, S: AsyncSpawner> Resource<G, S> for TextureDataResource {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let snapshot = match collect_asset_snapshot(manager.cache_mut(), &self.asset) {
            Ok(snapshot) => snapshot,
            Err(status) => return status,
        };
        if texture_descriptor(&snapshot.data).is_none() {
            log::error!("Texture {} has no slices or levels", self.asset.id());
            return TaskComplete::Error;
        }
        self.load = Some(snapshot);
        TaskComplete::Yes
    }

    fn process_data(
        &mut self,
        _manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        match self.load.take() {
            Some(snapshot) => {
                self.current = Some(snapshot.data);
                TaskComplete::Yes
            }
            None => TaskComplete::Error,
        }
    }

    fn reset_data(&mut self) {
        self.load = None;
    }

    fn on_asset_unloaded(&mut self, _pool: &mut TexturePool<G>) {
        self.current = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct TextureAndSamplerResource<G: GpuDevice> {
    asset: Arc<CustomAsset<TextureAssetData>>,
    load: Option<(AssetSnapshot<TextureAssetData>, TextureDescriptor)>,
    current: Option<Arc<TextureAndSamplerData<G>>>,
}

impl<G: GpuDevice> TextureAndSamplerResource<G> {
    pub(crate) fn new(asset: Arc<CustomAsset<TextureAssetData>>) -> Self {
        Self {
            asset,
            load: None,
            current: None,
        }
    }

    pub fn data(&self) -> Option<Arc<TextureAndSamplerData<G>>> {
        self.current.clone()
    }
}

impl<G: GpuDevice, S: AsyncSpawner> Resource<G, S> for TextureAndSamplerResource<G> {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let snapshot = match collect_asset_snapshot(manager.cache_mut(), &self.asset) {
            Ok(snapshot) => snapshot,
            Err(status) => return status,
        };
        let Some(descriptor) = texture_descriptor(&snapshot.data) else {
            log::error!("Texture {} has no slices or levels", self.asset.id());
            return TaskComplete::Error;
        };
        self.load = Some((snapshot, descriptor));
        TaskComplete::Yes
    }

    fn process_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let Some((snapshot, descriptor)) = self.load.take() else {
            return TaskComplete::Error;
        };

        let texture = match manager.allocate_texture(&descriptor) {
            Ok(texture) => texture,
            Err(err) => {
                log::error!("Failed to allocate texture {}: {err}", self.asset.id());
                return TaskComplete::Error;
            }
        };

        for (layer, slice) in snapshot.data.slices.iter().enumerate() {
            for (level, data) in slice.levels.iter().enumerate() {
                if let Err(err) =
                    manager
                        .gpu()
                        .upload_texture(&texture, level as u32, layer as u32, &data.data)
                {
                    log::error!("Failed to upload texture {}: {err}", self.asset.id());
                    manager.release_texture(texture);
                    return TaskComplete::Error;
                }
            }
        }

        let data = Arc::new(TextureAndSamplerData {
            texture,
            sampler: snapshot.data.sampler,
            descriptor,
        });
        if let Some(previous) = self.current.replace(data) {
            manager.release_texture(previous.texture.clone());
        }
        TaskComplete::Yes
    }

    fn reset_data(&mut self) {
        self.load = None;
    }

    fn on_asset_unloaded(&mut self, pool: &mut TexturePool<G>) {
        if let Some(current) = self.current.take() {
            pool.release_texture(current.texture.clone());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

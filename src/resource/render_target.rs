//! Render target resource
//!
//! Allocates an empty texture sized from the asset's metadata. Screen
//! targets follow the format the backend is presenting with. Unlike plain
//! textures, the GPU texture goes back to the pool as soon as the asset is
//! evicted.

use std::any::Any;
use std::sync::Arc;

use super::texture::TextureAndSamplerData;
use super::{collect_asset_snapshot, Resource, ResourceId, TaskComplete};
use crate::cache::TexturePool;
use crate::gpu::{GpuDevice, TextureDescriptor, TextureKind, TextureUsage};
use crate::library::{AssetSnapshot, CustomAsset, RenderTargetAssetData, RenderTargetKind};
use crate::manager::CustomResourceManager;
use crate::runtime::AsyncSpawner;

pub struct RenderTargetResource<G: GpuDevice> {
    asset: Arc<CustomAsset<RenderTargetAssetData>>,
    load: Option<(AssetSnapshot<RenderTargetAssetData>, TextureDescriptor)>,
    current: Option<Arc<TextureAndSamplerData<G>>>,
}

impl<G: GpuDevice> RenderTargetResource<G> {
    pub(crate) fn new(asset: Arc<CustomAsset<RenderTargetAssetData>>) -> Self {
        Self {
            asset,
            load: None,
            current: None,
        }
    }

    pub fn data(&self) -> Option<Arc<TextureAndSamplerData<G>>> {
        self.current.clone()
    }

    fn descriptor(gpu: &G, data: &RenderTargetAssetData) -> TextureDescriptor {
        let format = match data.kind {
            RenderTargetKind::Offscreen => data.format,
            RenderTargetKind::ScreenColor => gpu.screen_color_format(),
            RenderTargetKind::ScreenDepth => gpu.screen_depth_format(),
        };
        TextureDescriptor {
            width: data.width,
            height: data.height,
            layers: 1,
            mip_levels: 1,
            format,
            kind: TextureKind::Texture2D,
            usage: TextureUsage::RenderTarget,
        }
    }
}

impl<G: GpuDevice, S: AsyncSpawner> Resource<G, S> for RenderTargetResource<G> {
    fn collect_primary_data(
        &mut self,
        manager: &mut CustomResourceManager<G, S>,
        _id: ResourceId,
    ) -> TaskComplete {
        let snapshot = match collect_asset_snapshot(manager.cache_mut(), &self.asset) {
            Ok(snapshot) => snapshot,
            Err(status) => return status,
        };
        if snapshot.data.width == 0 || snapshot.data.height == 0 {
            log::error!("Render target {} has an empty extent", self.asset.id());
            return TaskComplete::Error;
        }
        let descriptor = Self::descriptor(manager.gpu(), &snapshot.data);
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
                log::error!("Failed to allocate render target {}: {err}", self.asset.id());
                return TaskComplete::Error;
            }
        };

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
            log::debug!("Returning render target {} to the pool", self.asset.id());
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

//! Shared fixtures for the resource integration tests
#![allow(dead_code)]

use archetype_resource::library::{MaterialTextureSlot, ShaderSampler};
use archetype_resource::{
    CacheConfig, CustomResourceManager, GpuTextureFormat, InMemoryAssetLibrary,
    MaterialAssetData, MockGpu, MockSpawner, ResourceId, ShaderAssetData, TaskComplete,
    TextureAssetData, TextureKind,
};
use std::sync::Arc;

pub type Manager = CustomResourceManager<MockGpu, MockSpawner>;

pub fn manager(library: &Arc<InMemoryAssetLibrary>) -> Manager {
    manager_with(library, MockSpawner::blocking(), CacheConfig::default())
}

pub fn manager_with(
    library: &Arc<InMemoryAssetLibrary>,
    spawner: MockSpawner,
    config: CacheConfig,
) -> Manager {
    let mut manager = CustomResourceManager::new(MockGpu::new(), spawner, library.clone(), config);
    manager.initialize();
    manager
}

/// Request every frame until the resource leaves `No`, running queued
/// work and the cache update in between
pub fn drive(manager: &mut Manager, mut request: impl FnMut(&mut Manager) -> ResourceId) -> ResourceId {
    for _ in 0..16 {
        let id = request(manager);
        if manager.is_data_processed(id) != TaskComplete::No {
            return id;
        }
        manager.spawner().run_pending();
        manager.update();
    }
    request(manager)
}

/// Square RGBA8 texture whose bytes count up from `seed`
pub fn rgba_texture(size: u32, seed: u8) -> TextureAssetData {
    let len = (size * size * 4) as usize;
    let data = (0..len).map(|i| seed.wrapping_add(i as u8)).collect();
    TextureAssetData::single_level(size, size, GpuTextureFormat::Rgba8Unorm, data)
}

pub fn shader(samplers: &[TextureKind]) -> ShaderAssetData {
    ShaderAssetData {
        vertex_source: "void main() { gl_Position = vec4(0.0); }".into(),
        pixel_source: "void main() {}".into(),
        geometry_source: None,
        samplers: samplers
            .iter()
            .enumerate()
            .map(|(slot, &kind)| ShaderSampler {
                name: format!("samp{slot}"),
                kind,
            })
            .collect(),
    }
}

pub fn material(shader: &str, textures: Vec<MaterialTextureSlot>) -> MaterialAssetData {
    MaterialAssetData {
        shader_asset: shader.into(),
        textures,
        ..Default::default()
    }
}

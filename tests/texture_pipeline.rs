//! End-to-end tests for texture, texture-and-sampler and render target
//! resources

mod common;

use archetype_resource::library::{FilterMode, RenderTargetKind, SamplerState, WrapMode};
use archetype_resource::{
    CacheConfig, GpuDevice, GpuTextureFormat, InMemoryAssetLibrary, LoadStatus, MockSpawner,
    RenderTargetAssetData, ResourceState, TaskComplete, TextureAssetData, TextureUsage,
};
use common::{drive, manager, manager_with, rgba_texture};
use std::sync::Arc;

fn nearest_clamp() -> SamplerState {
    SamplerState {
        min_filter: FilterMode::Nearest,
        mag_filter: FilterMode::Nearest,
        wrap_u: WrapMode::Clamp,
        wrap_v: WrapMode::Clamp,
        ..Default::default()
    }
}

#[test]
fn test_texture_and_sampler_end_to_end() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_texture("brick", rgba_texture(4, 0).with_sampler(nearest_clamp()));
    let mut manager = manager(&library);

    let id = manager.get_texture_and_sampler_from_asset("brick").unwrap();
    assert_eq!(manager.is_data_processed(id), TaskComplete::No);
    assert!(manager.texture_and_sampler_data(id).is_none());

    manager.update();
    let again = manager.get_texture_and_sampler_from_asset("brick").unwrap();
    assert_eq!(again, id);
    assert_eq!(manager.state(id), Some(ResourceState::DataAvailable));

    let data = manager.texture_and_sampler_data(id).unwrap();
    assert_eq!(data.sampler, nearest_clamp());
    assert_eq!((data.descriptor.width, data.descriptor.height), (4, 4));
    assert_eq!(data.descriptor.format, GpuTextureFormat::Rgba8Unorm);
    assert_eq!(
        data.texture.level_data(0, 0).unwrap(),
        rgba_texture(4, 0).slices[0].levels[0].data
    );
}

#[test]
fn test_eviction_returns_texture_to_pool() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_texture("brick", rgba_texture(4, 0));
    let mut manager = manager(&library);

    let id = drive(&mut manager, |m| m.get_texture_and_sampler_from_asset("brick").unwrap());
    manager.mark_as_active(id);
    let data = manager.texture_and_sampler_data(id).unwrap();
    let texture_id = data.texture.id;
    let descriptor = data.descriptor.clone();
    drop(data);

    manager.cache_mut().set_memory_budget(0);
    manager.update();

    assert!(manager.texture_and_sampler_data(id).is_none());
    assert_eq!(manager.state(id), Some(ResourceState::ReloadData));
    assert_eq!(manager.pool().free_count_for(&descriptor), 1);

    manager.cache_mut().set_memory_budget(1024);
    let id = drive(&mut manager, |m| m.get_texture_and_sampler_from_asset("brick").unwrap());
    let data = manager.texture_and_sampler_data(id).unwrap();
    assert_eq!(data.texture.id, texture_id, "pooled texture reused");
    assert_eq!(manager.gpu().textures_created(), 1);
    assert_eq!(manager.pool().free_count(), 0);
}

#[test]
fn test_texture_drawn_every_frame_stays_resident() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_texture("stale", rgba_texture(4, 0));
    library.insert_texture("hot", rgba_texture(4, 1));
    let config = CacheConfig::default().with_memory_budget(100);
    let mut manager = manager_with(&library, MockSpawner::blocking(), config);

    let mut stale = None;
    for _ in 0..3 {
        let id = manager.get_texture_and_sampler_from_asset("stale").unwrap();
        manager.mark_as_active(id);
        manager.update();
        stale = Some(id);
    }
    let mut hot = None;
    for _ in 0..20 {
        let id = manager.get_texture_and_sampler_from_asset("hot").unwrap();
        manager.mark_as_active(id);
        manager.update();
        hot = Some(id);
    }
    let (stale, hot) = (stale.unwrap(), hot.unwrap());

    assert_eq!(manager.is_data_processed(hot), TaskComplete::Yes);
    assert_eq!(library.load_count("hot"), 1);
    assert_eq!(manager.cache().metrics().evictions(), 1);
    let stale_asset = manager.resource_core(stale).unwrap().asset();
    assert_eq!(manager.cache().load_status(stale_asset), Some(LoadStatus::Unloaded));
    assert!(manager.texture_and_sampler_data(stale).is_none());
}

#[test]
fn test_reload_swaps_data_and_recycles_previous_texture() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_texture("brick", rgba_texture(4, 0));
    let mut manager = manager(&library);
    let id = drive(&mut manager, |m| m.get_texture_and_sampler_from_asset("brick").unwrap());
    let before = manager.texture_and_sampler_data(id).unwrap();

    library.insert_texture("brick", rgba_texture(4, 100));
    manager.mark_asset_dirty("brick");
    manager.update();

    // Readers keep the old snapshot until the new one is complete.
    let during = manager.texture_and_sampler_data(id).unwrap();
    assert!(Arc::ptr_eq(&before, &during));
    assert_eq!(manager.state(id), Some(ResourceState::ReloadData));

    drive(&mut manager, |m| m.get_texture_and_sampler_from_asset("brick").unwrap());
    let after = manager.texture_and_sampler_data(id).unwrap();
    assert_ne!(after.texture.id, before.texture.id);
    assert_eq!(after.texture.level_data(0, 0).unwrap()[0], 100);
    assert_eq!(manager.pool().free_count_for(&before.descriptor), 1);
}

#[test]
fn test_texture_without_levels_is_invalid() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_texture("empty", TextureAssetData::default());
    let mut manager = manager(&library);

    let id = drive(&mut manager, |m| m.get_texture_and_sampler_from_asset("empty").unwrap());
    assert_eq!(manager.is_data_processed(id), TaskComplete::Error);
    assert_eq!(manager.state(id), Some(ResourceState::CollectingPrimaryData));
    assert_eq!(manager.gpu().textures_created(), 0);
}

#[test]
fn test_texture_data_publishes_cpu_copy() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_texture("brick", rgba_texture(2, 9));
    let mut manager = manager(&library);

    let id = drive(&mut manager, |m| m.get_texture_data_from_asset("brick").unwrap());
    let data = manager.texture_data(id).unwrap();
    assert_eq!(data.slices[0].levels[0].data[0], 9);
    assert_eq!(manager.gpu().textures_created(), 0);

    manager.cache_mut().set_memory_budget(0);
    manager.update();
    assert!(manager.texture_data(id).is_none());
}

#[test]
fn test_screen_render_target_follows_backend_format() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_render_target(
        "scene_depth",
        RenderTargetAssetData {
            kind: RenderTargetKind::ScreenDepth,
            width: 64,
            height: 32,
            format: GpuTextureFormat::Rgba8Unorm,
            sampler: SamplerState::default(),
        },
    );
    let mut manager = manager(&library);

    let id = drive(&mut manager, |m| m.get_render_target_from_asset("scene_depth").unwrap());
    let data = manager.render_target_data(id).unwrap();
    assert_eq!(data.descriptor.format, manager.gpu().screen_depth_format());
    assert_eq!(data.descriptor.usage, TextureUsage::RenderTarget);
    assert_eq!((data.descriptor.width, data.descriptor.height), (64, 32));
    assert!(manager.sampled_texture_data(id).is_some());
}

#[test]
fn test_render_target_with_empty_extent_is_invalid() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_render_target(
        "broken",
        RenderTargetAssetData {
            kind: RenderTargetKind::Offscreen,
            width: 0,
            height: 32,
            format: GpuTextureFormat::Rgba16Float,
            sampler: SamplerState::default(),
        },
    );
    let mut manager = manager(&library);

    let id = drive(&mut manager, |m| m.get_render_target_from_asset("broken").unwrap());
    assert_eq!(manager.is_data_processed(id), TaskComplete::Error);
    assert!(manager.render_target_data(id).is_none());
}

#[test]
fn test_render_target_eviction_returns_texture_to_pool() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    library.insert_render_target(
        "bloom",
        RenderTargetAssetData {
            kind: RenderTargetKind::Offscreen,
            width: 64,
            height: 32,
            format: GpuTextureFormat::Rgba16Float,
            sampler: SamplerState::default(),
        },
    );
    let mut manager = manager(&library);

    let id = drive(&mut manager, |m| m.get_render_target_from_asset("bloom").unwrap());
    manager.mark_as_active(id);
    let data = manager.render_target_data(id).unwrap();
    let texture_id = data.texture.id;
    let descriptor = data.descriptor.clone();
    drop(data);

    manager.cache_mut().set_memory_budget(0);
    manager.update();

    assert!(manager.render_target_data(id).is_none());
    assert_eq!(manager.state(id), Some(ResourceState::ReloadData));
    assert_eq!(manager.pool().free_count_for(&descriptor), 1);

    manager.cache_mut().set_memory_budget(1024);
    let id = drive(&mut manager, |m| m.get_render_target_from_asset("bloom").unwrap());
    let data = manager.render_target_data(id).unwrap();
    assert_eq!(data.texture.id, texture_id, "pooled texture reused");
    assert_eq!(manager.gpu().textures_created(), 1);
    assert_eq!(manager.pool().free_count(), 0);
}

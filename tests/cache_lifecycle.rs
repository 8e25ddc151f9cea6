//! Integration tests for the asset cache: registration, loading, hot reload
//! and budgeted eviction

use archetype_resource::{
    AssetHandle, AssetListener, CacheConfig, CustomAssetCache, GpuTextureFormat,
    InMemoryAssetLibrary, LoadStatus, MockSpawner, ResourceId, TextureAssetData,
};
use slotmap::SlotMap;
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
    loaded: Vec<(ResourceId, AssetHandle)>,
    failed: Vec<(ResourceId, AssetHandle)>,
    unloaded: Vec<(ResourceId, AssetHandle)>,
}

impl AssetListener for Recorder {
    fn notify_asset_load_success(&mut self, listener: ResourceId, asset: AssetHandle) {
        self.loaded.push((listener, asset));
    }

    fn notify_asset_load_failed(&mut self, listener: ResourceId, asset: AssetHandle) {
        self.failed.push((listener, asset));
    }

    fn asset_unloaded(&mut self, listener: ResourceId, asset: AssetHandle) {
        self.unloaded.push((listener, asset));
    }
}

/// 16-byte textures named `ids`
fn library(ids: &[&str]) -> Arc<InMemoryAssetLibrary> {
    let library = Arc::new(InMemoryAssetLibrary::new());
    for id in ids {
        library.insert_texture(
            *id,
            TextureAssetData::single_level(2, 2, GpuTextureFormat::Rgba8Unorm, vec![0; 16]),
        );
    }
    library
}

fn listeners(count: usize) -> Vec<ResourceId> {
    let mut ids = SlotMap::<ResourceId, ()>::with_key();
    (0..count).map(|_| ids.insert(())).collect()
}

#[test]
fn test_create_asset_is_idempotent() {
    let library = library(&["x"]);
    let listener = listeners(1)[0];
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), CacheConfig::default());

    let first = cache
        .create_asset::<TextureAssetData>("x", library.clone(), None)
        .unwrap();
    let data = cache.asset_data(first.handle()).unwrap();
    assert_eq!(data.load_status(), LoadStatus::PendingReload);
    assert_eq!(data.listener_count(), 0);

    let second = cache
        .create_asset::<TextureAssetData>("x", library, Some(listener))
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.handle(), first.handle());
    assert_eq!(cache.asset_data(first.handle()).unwrap().listeners(), &[listener]);
    assert_eq!(cache.asset_count(), 1);
}

#[test]
fn test_tight_budget_evicts_least_recently_activated() {
    let library = library(&["x", "y"]);
    let ids = listeners(2);
    let config = CacheConfig::default().with_memory_budget(20);
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), config);
    let x = cache
        .create_asset::<TextureAssetData>("x", library.clone(), Some(ids[0]))
        .unwrap()
        .handle();
    let y = cache
        .create_asset::<TextureAssetData>("y", library, Some(ids[1]))
        .unwrap()
        .handle();

    cache.mark_asset_active(x);
    cache.mark_asset_active(x);
    cache.mark_asset_active(y);
    cache.mark_asset_pending(x);
    cache.mark_asset_pending(y);

    let mut events = Recorder::default();
    cache.update(&mut events);

    assert_eq!(events.loaded.len(), 2);
    assert_eq!(events.unloaded, vec![(ids[1], y)]);
    assert_eq!(cache.load_status(x), Some(LoadStatus::LoadFinished));
    assert_eq!(cache.load_status(y), Some(LoadStatus::Unloaded));
    assert_eq!(cache.memory_usage(), 16);
    assert_eq!(cache.metrics().evictions(), 1);
    assert_eq!(cache.metrics().bytes_evicted(), 16);
}

#[test]
fn test_asset_used_every_frame_outlives_stale_asset() {
    let library = library(&["stale", "hot"]);
    let config = CacheConfig::default().with_memory_budget(20);
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), config);
    let stale = cache
        .create_asset::<TextureAssetData>("stale", library.clone(), None)
        .unwrap()
        .handle();
    let hot = cache
        .create_asset::<TextureAssetData>("hot", library.clone(), None)
        .unwrap()
        .handle();

    for _ in 0..3 {
        cache.mark_asset_pending(stale);
        cache.mark_asset_active(stale);
        cache.update(&mut Recorder::default());
    }
    for _ in 0..20 {
        cache.mark_asset_pending(hot);
        cache.mark_asset_active(hot);
        cache.update(&mut Recorder::default());
    }

    assert_eq!(cache.load_status(hot), Some(LoadStatus::LoadFinished));
    assert_eq!(cache.load_status(stale), Some(LoadStatus::Unloaded));
    assert_eq!(library.load_count("hot"), 1);
    assert_eq!(cache.metrics().evictions(), 1);
    assert_eq!(cache.memory_usage(), 16);
}

#[test]
fn test_resident_asset_ignores_pending_requests() {
    let library = library(&["x"]);
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), CacheConfig::default());
    let x = cache
        .create_asset::<TextureAssetData>("x", library.clone(), None)
        .unwrap()
        .handle();

    cache.mark_asset_pending(x);
    cache.update(&mut Recorder::default());
    cache.mark_asset_pending(x);
    cache.update(&mut Recorder::default());

    assert_eq!(library.load_count("x"), 1);
    assert!(!cache.pending_queue().contains(x));
}

#[test]
fn test_evicted_asset_reloads_on_request() {
    let library = library(&["x"]);
    let config = CacheConfig::default().with_memory_budget(8);
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), config);
    let asset = cache
        .create_asset::<TextureAssetData>("x", library.clone(), None)
        .unwrap();

    cache.mark_asset_pending(asset.handle());
    cache.update(&mut Recorder::default());
    assert_eq!(cache.load_status(asset.handle()), Some(LoadStatus::Unloaded));
    assert!(asset.get_data().is_none());

    cache.set_memory_budget(64);
    cache.mark_asset_pending(asset.handle());
    cache.update(&mut Recorder::default());
    assert_eq!(cache.load_status(asset.handle()), Some(LoadStatus::LoadFinished));
    assert_eq!(asset.get_data().unwrap().version, 2);
    assert_eq!(library.load_count("x"), 2);
}

#[test]
fn test_reloading_asset_is_not_evicted() {
    let library = library(&["x"]);
    let spawner = MockSpawner::deferred();
    let mut cache = CustomAssetCache::new(spawner.clone(), CacheConfig::default());
    let x = cache
        .create_asset::<TextureAssetData>("x", library, None)
        .unwrap()
        .handle();

    cache.mark_asset_pending(x);
    cache.update(&mut Recorder::default());
    spawner.run_pending();
    cache.update(&mut Recorder::default());
    assert_eq!(cache.memory_usage(), 16);

    cache.set_memory_budget(0);
    cache.mark_asset_dirty("x");
    cache.update(&mut Recorder::default());

    assert_eq!(cache.load_status(x), Some(LoadStatus::PendingReload));
    assert_eq!(cache.memory_usage(), 16, "over budget until the reload lands");
}

#[test]
fn test_stale_load_is_discarded_and_rescheduled() {
    let library = library(&["x"]);
    let listener = listeners(1)[0];
    let spawner = MockSpawner::deferred();
    let mut cache = CustomAssetCache::new(spawner.clone(), CacheConfig::default());
    let asset = cache
        .create_asset::<TextureAssetData>("x", library.clone(), Some(listener))
        .unwrap();
    let mut events = Recorder::default();

    cache.mark_asset_pending(asset.handle());
    cache.update(&mut events);
    assert_eq!(cache.loads_in_flight(), 1);

    // The source changes while the first load is still queued.
    cache.mark_asset_dirty("x");
    cache.update(&mut events);
    spawner.run_pending();
    cache.update(&mut events);

    assert_eq!(cache.metrics().stale_loads(), 1);
    assert!(events.loaded.is_empty());
    assert_eq!(cache.load_status(asset.handle()), Some(LoadStatus::PendingReload));

    cache.update(&mut events);
    spawner.run_pending();
    cache.update(&mut events);

    assert_eq!(events.loaded, vec![(listener, asset.handle())]);
    assert_eq!(library.load_count("x"), 2);
    assert_eq!(cache.load_status(asset.handle()), Some(LoadStatus::LoadFinished));
}

#[test]
fn test_failed_load_still_notifies() {
    let library = library(&[]);
    let listener = listeners(1)[0];
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), CacheConfig::default());
    let handle = cache
        .create_asset::<TextureAssetData>("missing", library, Some(listener))
        .unwrap()
        .handle();

    let mut events = Recorder::default();
    cache.mark_asset_pending(handle);
    cache.update(&mut events);

    assert_eq!(events.failed, vec![(listener, handle)]);
    assert!(cache.has_errors(handle));
    assert_eq!(cache.load_status(handle), Some(LoadStatus::LoadFinished));
    assert_eq!(cache.metrics().load_failures(), 1);
}

#[test]
fn test_dropped_load_counts_as_failure() {
    let library = library(&["x"]);
    let listener = listeners(1)[0];
    let mut cache = CustomAssetCache::new(MockSpawner::new(), CacheConfig::default());
    let handle = cache
        .create_asset::<TextureAssetData>("x", library.clone(), Some(listener))
        .unwrap()
        .handle();

    let mut events = Recorder::default();
    cache.mark_asset_pending(handle);
    cache.update(&mut events);

    assert_eq!(events.failed, vec![(listener, handle)]);
    assert!(cache.has_errors(handle));
    assert_eq!(library.load_count("x"), 0);
}

#[test]
fn test_loads_in_flight_are_capped() {
    let names = ["a", "b", "c", "d"];
    let library = library(&names);
    let spawner = MockSpawner::deferred();
    let config = CacheConfig::default().with_max_loads_in_flight(2);
    let mut cache = CustomAssetCache::new(spawner.clone(), config);
    for name in names {
        let handle = cache
            .create_asset::<TextureAssetData>(name, library.clone(), None)
            .unwrap()
            .handle();
        cache.mark_asset_pending(handle);
    }

    cache.update(&mut Recorder::default());
    assert_eq!(cache.loads_in_flight(), 2);
    assert_eq!(spawner.pending_count(), 2);

    spawner.run_pending();
    cache.update(&mut Recorder::default());
    assert_eq!(cache.loads_in_flight(), 0);
    assert_eq!(cache.memory_usage(), 32);

    cache.update(&mut Recorder::default());
    assert_eq!(cache.loads_in_flight(), 2, "remaining two scheduled once slots free up");

    spawner.run_pending();
    cache.update(&mut Recorder::default());
    assert_eq!(cache.loads_in_flight(), 0);
    assert_eq!(cache.memory_usage(), 64);
}

#[test]
fn test_dirty_notifier_crosses_threads() {
    let library = library(&["x"]);
    let listener = listeners(1)[0];
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), CacheConfig::default());
    let handle = cache
        .create_asset::<TextureAssetData>("x", library.clone(), Some(listener))
        .unwrap()
        .handle();
    cache.mark_asset_pending(handle);
    cache.update(&mut Recorder::default());

    let notifier = cache.dirty_notifier();
    std::thread::spawn(move || {
        notifier.mark_asset_dirty("x");
        notifier.mark_asset_dirty("unknown");
    })
    .join()
    .unwrap();

    let mut events = Recorder::default();
    cache.update(&mut events);
    assert_eq!(events.loaded, vec![(listener, handle)]);
    assert_eq!(library.load_count("x"), 2);
}

#[test]
fn test_reset_unloads_everything() {
    let library = library(&["x"]);
    let mut cache = CustomAssetCache::new(MockSpawner::blocking(), CacheConfig::default());
    let asset = cache
        .create_asset::<TextureAssetData>("x", library, None)
        .unwrap();
    cache.mark_asset_pending(asset.handle());
    cache.update(&mut Recorder::default());
    assert!(asset.get_data().is_some());

    cache.reset();
    assert!(asset.get_data().is_none());
    assert_eq!(cache.memory_usage(), 0);
    assert_eq!(cache.asset_count(), 0);
    assert!(cache.active_queue().is_empty());
}

//! archetype_resource - Memory-budgeted custom asset cache with dependency-driven resources
//!
//! # Features
//! - LRU asset cache with a resident memory budget and hot reload
//! - Five-state resource pipeline that never blocks the render thread
//! - Reference graph with cycle-safe invalidation
//! - Pooled GPU textures recycled across reloads and evictions
//! - GPU abstraction (backend via trait)
//! - Async runtime abstraction (rayon worker pool, Tokio, custom)
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_resource::{CacheConfig, CustomResourceManager, InMemoryAssetLibrary, MockGpu, MockSpawner};
//!
//! let library = Arc::new(InMemoryAssetLibrary::new());
//! let mut manager = CustomResourceManager::new(MockGpu::new(), MockSpawner::blocking(), library, CacheConfig::default());
//! manager.initialize();
//! let texture = manager.get_texture_and_sampler_from_asset("brick")?;
//! manager.mark_as_active(texture);
//! manager.update();
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-rayon` (default): fixed rayon worker pool spawner
//! - `runtime-tokio`: Enable Tokio async runtime
//! - `serde`: Serialize configuration and value types

// Core modules
pub mod cache;
pub mod gpu;
pub mod library;
pub mod manager;
pub mod resource;
pub mod runtime;

// Support modules
pub mod config;
pub mod pipeline;

// Error types
mod error;
pub use error::{ResourceError, Result};

// Re-export main types from cache
pub use cache::metrics::{CacheMetrics, CacheMetricsHandle};
pub use cache::{
    AssetData, AssetHandle, AssetListener, AssetPriorityQueue, CustomAssetCache,
    DirtyAssetNotifier, LoadStatus, TexturePool,
};
pub use config::{CacheConfig, ShaderHostConfig, DEFAULT_MEMORY_BUDGET};
pub use manager::CustomResourceManager;

// Re-export GPU types
pub use gpu::mock::MockGpu;
pub use gpu::{
    BufferUsage, GpuCapabilities, GpuDevice, GpuError, GpuResult, GpuTextureFormat,
    TextureDescriptor, TextureKind, TextureUsage,
};

// Re-export library types
pub use library::{
    AssetId, AssetLibrary, AssetSnapshot, CustomAsset, InMemoryAssetLibrary, LibraryError,
    MaterialAssetData, MeshAssetData, RenderTargetAssetData, ShaderAssetData, TextureAssetData,
};

// Re-export resource types
pub use resource::material::{MaterialData, MaterialTexture};
pub use resource::mesh::{MeshChunk, MeshData};
pub use resource::shader::ShaderData;
pub use resource::texture::TextureAndSamplerData;
pub use resource::{Resource, ResourceCore, ResourceId, ResourceState, TaskComplete};

// Re-export pipeline types
pub use pipeline::{PipelineUid, ShaderVariant};

// Re-export runtime types
pub use runtime::mock::MockSpawner;
#[cfg(feature = "runtime-rayon")]
pub use runtime::rayon_impl::RayonSpawner;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{spawn_work, AsyncSpawner, WorkHandle, WorkPoll};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

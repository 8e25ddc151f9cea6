//! Asset library collaborator
//!
//! The library owns decoding and storage of user asset overrides. The cache
//! asks it for decoded payloads on worker threads and keeps the results as
//! versioned snapshots inside [`CustomAsset`]s.

pub mod asset;
pub mod data;
pub mod memory;

use std::fmt::Debug;
use thiserror::Error;

pub use asset::{AssetKind, AssetPayload, AssetSnapshot, CustomAsset, LoadableAsset};
pub use data::{
    FilterMode, MaterialAssetData, MaterialTextureSlot, MeshAssetData, MeshChunkAssetData,
    RenderTargetAssetData, RenderTargetKind, SamplerState, ShaderAssetData, ShaderSampler,
    TextureAssetData, TextureLevel, TextureSlice, TextureSource, WrapMode,
};
pub use memory::InMemoryAssetLibrary;

/// Opaque, stable key naming one user asset
pub type AssetId = String;

/// Error type for asset library operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Asset not found: {0}")]
    NotFound(AssetId),

    #[error("Asset {id} is a {found:?}, expected {expected:?}")]
    WrongKind {
        id: AssetId,
        expected: AssetKind,
        found: AssetKind,
    },

    #[error("Failed to decode asset {id}: {reason}")]
    Decode { id: AssetId, reason: String },
}

/// Result type alias for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Source of decoded asset payloads
///
/// Called from worker threads; implementations must be thread-safe.
pub trait AssetLibrary: Send + Sync + Debug {
    fn load_texture(&self, id: &str) -> LibraryResult<TextureAssetData>;

    fn load_render_target(&self, id: &str) -> LibraryResult<RenderTargetAssetData>;

    fn load_shader(&self, id: &str) -> LibraryResult<ShaderAssetData>;

    fn load_material(&self, id: &str) -> LibraryResult<MaterialAssetData>;

    fn load_mesh(&self, id: &str) -> LibraryResult<MeshAssetData>;
}

//! Typed asset records and their load/unload cycle

use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::data::{
    MaterialAssetData, MeshAssetData, RenderTargetAssetData, ShaderAssetData, TextureAssetData,
};
use super::{AssetId, AssetLibrary, LibraryResult};
use crate::cache::AssetHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssetKind {
    Texture,
    RenderTarget,
    Shader,
    Material,
    Mesh,
}

/// A decoded payload type the library knows how to produce
pub trait AssetPayload: Send + Sync + Sized + 'static {
    const KIND: AssetKind;

    fn load(library: &dyn AssetLibrary, id: &str) -> LibraryResult<Self>;

    /// Bytes this payload keeps resident, charged against the cache budget
    fn byte_size(&self) -> usize;
}

impl AssetPayload for TextureAssetData {
    const KIND: AssetKind = AssetKind::Texture;

    fn load(library: &dyn AssetLibrary, id: &str) -> LibraryResult<Self> {
        library.load_texture(id)
    }

    fn byte_size(&self) -> usize {
        TextureAssetData::byte_size(self)
    }
}

impl AssetPayload for RenderTargetAssetData {
    const KIND: AssetKind = AssetKind::RenderTarget;

    fn load(library: &dyn AssetLibrary, id: &str) -> LibraryResult<Self> {
        library.load_render_target(id)
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl AssetPayload for ShaderAssetData {
    const KIND: AssetKind = AssetKind::Shader;

    fn load(library: &dyn AssetLibrary, id: &str) -> LibraryResult<Self> {
        library.load_shader(id)
    }

    fn byte_size(&self) -> usize {
        ShaderAssetData::byte_size(self)
    }
}

impl AssetPayload for MaterialAssetData {
    const KIND: AssetKind = AssetKind::Material;

    fn load(library: &dyn AssetLibrary, id: &str) -> LibraryResult<Self> {
        library.load_material(id)
    }

    fn byte_size(&self) -> usize {
        MaterialAssetData::byte_size(self)
    }
}

impl AssetPayload for MeshAssetData {
    const KIND: AssetKind = AssetKind::Mesh;

    fn load(library: &dyn AssetLibrary, id: &str) -> LibraryResult<Self> {
        library.load_mesh(id)
    }

    fn byte_size(&self) -> usize {
        MeshAssetData::byte_size(self)
    }
}

/// Immutable view of an asset's data at one load
#[derive(Debug)]
pub struct AssetSnapshot<D> {
    pub data: Arc<D>,
    /// Increments on every successful load
    pub version: u64,
    pub loaded_at: Instant,
}

impl<D> Clone for AssetSnapshot<D> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            version: self.version,
            loaded_at: self.loaded_at,
        }
    }
}

/// Type-erased face of a [`CustomAsset`], as stored by the cache
pub trait LoadableAsset: Send + Sync + fmt::Debug {
    fn asset_id(&self) -> &str;

    fn handle(&self) -> AssetHandle;

    fn kind(&self) -> AssetKind;

    /// Fetch fresh data from the library, returns the resident byte count
    fn load(&self) -> LibraryResult<usize>;

    /// Drop the resident data, returns the bytes freed
    fn unload(&self) -> usize;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// One user asset, owned by the cache and shared with the resources built
/// from it
pub struct CustomAsset<D> {
    id: AssetId,
    handle: AssetHandle,
    library: Arc<dyn AssetLibrary>,
    snapshot: RwLock<Option<AssetSnapshot<D>>>,
    version: AtomicU64,
}

impl<D> fmt::Debug for CustomAsset<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAsset")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("version", &self.version.load(Ordering::Relaxed))
            .finish()
    }
}

impl<D: AssetPayload> CustomAsset<D> {
    pub(crate) fn new(id: AssetId, handle: AssetHandle, library: Arc<dyn AssetLibrary>) -> Self {
        Self {
            id,
            handle,
            library,
            snapshot: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> AssetHandle {
        self.handle
    }

    /// Latest loaded data, `None` until the first successful load or after
    /// an unload
    pub fn get_data(&self) -> Option<AssetSnapshot<D>> {
        self.snapshot.read().clone()
    }

    pub fn last_loaded_time(&self) -> Option<Instant> {
        self.snapshot.read().as_ref().map(|s| s.loaded_at)
    }
}

impl<D: AssetPayload> LoadableAsset for CustomAsset<D> {
    fn asset_id(&self) -> &str {
        &self.id
    }

    fn handle(&self) -> AssetHandle {
        self.handle
    }

    fn kind(&self) -> AssetKind {
        D::KIND
    }

    fn load(&self) -> LibraryResult<usize> {
        let data = D::load(self.library.as_ref(), &self.id)?;
        let bytes = data.byte_size();
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        *self.snapshot.write() = Some(AssetSnapshot {
            data: Arc::new(data),
            version,
            loaded_at: Instant::now(),
        });
        Ok(bytes)
    }

    fn unload(&self) -> usize {
        self.snapshot
            .write()
            .take()
            .map_or(0, |snapshot| snapshot.data.byte_size())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

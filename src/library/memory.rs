//! In-memory asset library
//!
//! Holds decoded payloads in a map. Used by tests and demos in place of a
//! file-backed library; replacing an entry and then calling
//! `mark_asset_dirty` mimics an edit on disk.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::asset::AssetKind;
use super::data::{
    MaterialAssetData, MeshAssetData, RenderTargetAssetData, ShaderAssetData, TextureAssetData,
};
use super::{AssetId, AssetLibrary, LibraryError, LibraryResult};

#[derive(Debug, Clone)]
enum StoredAsset {
    Texture(TextureAssetData),
    RenderTarget(RenderTargetAssetData),
    Shader(ShaderAssetData),
    Material(MaterialAssetData),
    Mesh(MeshAssetData),
}

impl StoredAsset {
    fn kind(&self) -> AssetKind {
        match self {
            Self::Texture(_) => AssetKind::Texture,
            Self::RenderTarget(_) => AssetKind::RenderTarget,
            Self::Shader(_) => AssetKind::Shader,
            Self::Material(_) => AssetKind::Material,
            Self::Mesh(_) => AssetKind::Mesh,
        }
    }
}

/// Thread-safe map of asset id to decoded payload
#[derive(Debug, Default)]
pub struct InMemoryAssetLibrary {
    assets: RwLock<HashMap<AssetId, StoredAsset>>,
    load_counts: RwLock<HashMap<AssetId, u64>>,
}

impl InMemoryAssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_texture(&self, id: impl Into<AssetId>, data: TextureAssetData) {
        self.assets.write().insert(id.into(), StoredAsset::Texture(data));
    }

    pub fn insert_render_target(&self, id: impl Into<AssetId>, data: RenderTargetAssetData) {
        self.assets
            .write()
            .insert(id.into(), StoredAsset::RenderTarget(data));
    }

    pub fn insert_shader(&self, id: impl Into<AssetId>, data: ShaderAssetData) {
        self.assets.write().insert(id.into(), StoredAsset::Shader(data));
    }

    pub fn insert_material(&self, id: impl Into<AssetId>, data: MaterialAssetData) {
        self.assets
            .write()
            .insert(id.into(), StoredAsset::Material(data));
    }

    pub fn insert_mesh(&self, id: impl Into<AssetId>, data: MeshAssetData) {
        self.assets.write().insert(id.into(), StoredAsset::Mesh(data));
    }

    /// Remove an asset; later loads of it fail with `NotFound`
    pub fn remove(&self, id: &str) -> bool {
        self.assets.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.read().contains_key(id)
    }

    /// Number of load calls made for `id`, successful or not
    pub fn load_count(&self, id: &str) -> u64 {
        *self.load_counts.read().get(id).unwrap_or(&0)
    }

    fn fetch(&self, id: &str) -> LibraryResult<StoredAsset> {
        *self.load_counts.write().entry(id.to_string()).or_insert(0) += 1;

        self.assets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }
}

fn wrong_kind(id: &str, expected: AssetKind, found: &StoredAsset) -> LibraryError {
    LibraryError::WrongKind {
        id: id.to_string(),
        expected,
        found: found.kind(),
    }
}

impl AssetLibrary for InMemoryAssetLibrary {
    fn load_texture(&self, id: &str) -> LibraryResult<TextureAssetData> {
        match self.fetch(id)? {
            StoredAsset::Texture(data) => Ok(data),
            other => Err(wrong_kind(id, AssetKind::Texture, &other)),
        }
    }

    fn load_render_target(&self, id: &str) -> LibraryResult<RenderTargetAssetData> {
        match self.fetch(id)? {
            StoredAsset::RenderTarget(data) => Ok(data),
            other => Err(wrong_kind(id, AssetKind::RenderTarget, &other)),
        }
    }

    fn load_shader(&self, id: &str) -> LibraryResult<ShaderAssetData> {
        match self.fetch(id)? {
            StoredAsset::Shader(data) => Ok(data),
            other => Err(wrong_kind(id, AssetKind::Shader, &other)),
        }
    }

    fn load_material(&self, id: &str) -> LibraryResult<MaterialAssetData> {
        match self.fetch(id)? {
            StoredAsset::Material(data) => Ok(data),
            other => Err(wrong_kind(id, AssetKind::Material, &other)),
        }
    }

    fn load_mesh(&self, id: &str) -> LibraryResult<MeshAssetData> {
        match self.fetch(id)? {
            StoredAsset::Mesh(data) => Ok(data),
            other => Err(wrong_kind(id, AssetKind::Mesh, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_asset_counts_load() {
        let library = InMemoryAssetLibrary::new();
        assert_eq!(
            library.load_shader("missing"),
            Err(LibraryError::NotFound("missing".into()))
        );
        assert_eq!(library.load_count("missing"), 1);
    }

    #[test]
    fn test_wrong_kind_is_reported() {
        let library = InMemoryAssetLibrary::new();
        library.insert_shader("shader", ShaderAssetData::default());

        let err = library.load_material("shader").unwrap_err();
        assert_eq!(
            err,
            LibraryError::WrongKind {
                id: "shader".into(),
                expected: AssetKind::Material,
                found: AssetKind::Shader,
            }
        );
        assert!(matches!(
            library.load_mesh("shader"),
            Err(LibraryError::WrongKind { expected: AssetKind::Mesh, found: AssetKind::Shader, .. })
        ));
        assert_eq!(library.load_count("shader"), 2);
    }

    #[test]
    fn test_replace_and_remove() {
        let library = InMemoryAssetLibrary::new();
        library.insert_material(
            "mat",
            MaterialAssetData {
                shader_asset: "a".into(),
                ..Default::default()
            },
        );
        library.insert_material(
            "mat",
            MaterialAssetData {
                shader_asset: "b".into(),
                ..Default::default()
            },
        );
        assert_eq!(library.load_material("mat").unwrap().shader_asset, "b");
        assert!(library.remove("mat"));
        assert!(!library.contains("mat"));
    }
}

//! Decoded asset payloads
//!
//! These are the immutable values an [`AssetLibrary`](super::AssetLibrary)
//! hands back. Parsing them from files is the library's business.

use std::collections::{BTreeMap, HashMap};

use crate::gpu::{GpuTextureFormat, TextureKind};
use crate::pipeline::{BlendMode, CullMode, DepthState, PrimitiveType, VertexDeclaration};

use super::AssetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    Clamp,
    #[default]
    Repeat,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplerState {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub max_anisotropy: u8,
}

/// One mip level of one slice
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureLevel {
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    pub data: Vec<u8>,
}

/// One array layer (or cube face) with its mip chain
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureSlice {
    pub levels: Vec<TextureLevel>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureAssetData {
    pub kind: TextureKind,
    pub slices: Vec<TextureSlice>,
    pub sampler: SamplerState,
}

impl TextureAssetData {
    /// Single-slice 2D texture with one level
    pub fn single_level(width: u32, height: u32, format: GpuTextureFormat, data: Vec<u8>) -> Self {
        Self {
            kind: TextureKind::Texture2D,
            slices: vec![TextureSlice {
                levels: vec![TextureLevel {
                    width,
                    height,
                    format,
                    data,
                }],
            }],
            sampler: SamplerState::default(),
        }
    }

    pub fn with_sampler(mut self, sampler: SamplerState) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn byte_size(&self) -> usize {
        self.slices
            .iter()
            .flat_map(|slice| slice.levels.iter())
            .map(|level| level.data.len())
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RenderTargetKind {
    /// Plain offscreen target with an explicit format
    #[default]
    Offscreen,
    /// Copy of the presented color buffer
    ScreenColor,
    /// Copy of the presented depth buffer
    ScreenDepth,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderTargetAssetData {
    pub kind: RenderTargetKind,
    pub width: u32,
    pub height: u32,
    /// Ignored for screen targets, which follow the live screen format
    pub format: GpuTextureFormat,
    pub sampler: SamplerState,
}

/// Sampler declared by a shader, by slot index
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderSampler {
    pub name: String,
    pub kind: TextureKind,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderAssetData {
    pub vertex_source: String,
    pub pixel_source: String,
    pub geometry_source: Option<String>,
    pub samplers: Vec<ShaderSampler>,
}

impl ShaderAssetData {
    pub fn byte_size(&self) -> usize {
        self.vertex_source.len()
            + self.pixel_source.len()
            + self.geometry_source.as_ref().map_or(0, String::len)
            + self.samplers.iter().map(|s| s.name.len()).sum::<usize>()
    }
}

/// Which kind of resource a material texture slot binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureSource {
    #[default]
    Texture,
    RenderTarget,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialTextureSlot {
    /// Empty when the slot is unbound
    pub asset_id: AssetId,
    pub source: TextureSource,
    pub sampler_override: Option<SamplerState>,
}

impl MaterialTextureSlot {
    pub fn texture(asset_id: impl Into<AssetId>) -> Self {
        Self {
            asset_id: asset_id.into(),
            ..Default::default()
        }
    }

    pub fn render_target(asset_id: impl Into<AssetId>) -> Self {
        Self {
            asset_id: asset_id.into(),
            source: TextureSource::RenderTarget,
            sampler_override: None,
        }
    }

    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        !self.asset_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialAssetData {
    pub shader_asset: AssetId,
    pub textures: Vec<MaterialTextureSlot>,
    pub uniform_data: Vec<u8>,
    pub blend: Option<BlendMode>,
    pub cull_mode: Option<CullMode>,
    pub depth: Option<DepthState>,
    /// Empty when there is no follow-up pass
    pub next_material_asset: AssetId,
}

impl MaterialAssetData {
    pub fn byte_size(&self) -> usize {
        self.shader_asset.len()
            + self.next_material_asset.len()
            + self.uniform_data.len()
            + self.textures.iter().map(|t| t.asset_id.len()).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshChunkAssetData {
    pub vertex_data: Vec<u8>,
    pub vertex_declaration: VertexDeclaration,
    pub indices: Vec<u16>,
    pub primitive: PrimitiveType,
    pub material_name: String,
}

impl MeshChunkAssetData {
    pub fn vertex_count(&self) -> usize {
        match self.vertex_declaration.stride {
            0 => 0,
            stride => self.vertex_data.len() / stride as usize,
        }
    }

    fn byte_size(&self) -> usize {
        self.vertex_data.len() + self.indices.len() * std::mem::size_of::<u16>()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshAssetData {
    pub chunks: Vec<MeshChunkAssetData>,
    /// Chunk sets replacing `chunks` for specific draw calls
    pub skinned_chunks: BTreeMap<u64, Vec<MeshChunkAssetData>>,
    pub material_assets: HashMap<String, AssetId>,
}

impl MeshAssetData {
    pub fn byte_size(&self) -> usize {
        self.chunks
            .iter()
            .chain(self.skinned_chunks.values().flatten())
            .map(MeshChunkAssetData::byte_size)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{VertexFormat, VertexSemantic};

    #[test]
    fn test_texture_byte_size() {
        let data = TextureAssetData::single_level(4, 4, GpuTextureFormat::Rgba8Unorm, vec![0; 64]);
        assert_eq!(data.byte_size(), 64);
    }

    #[test]
    fn test_chunk_vertex_count() {
        let chunk = MeshChunkAssetData {
            vertex_data: vec![0; 36],
            vertex_declaration: VertexDeclaration::packed(&[(
                VertexSemantic::Position,
                VertexFormat::Float32x3,
            )]),
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        assert_eq!(chunk.vertex_count(), 3);

        let mesh = MeshAssetData {
            chunks: vec![chunk.clone()],
            skinned_chunks: BTreeMap::from([(7, vec![chunk])]),
            ..Default::default()
        };
        assert_eq!(mesh.byte_size(), 2 * (36 + 6));
    }

    #[test]
    fn test_slot_binding() {
        assert!(!MaterialTextureSlot::unbound().is_bound());
        assert!(MaterialTextureSlot::texture("tex").is_bound());
        assert_eq!(
            MaterialTextureSlot::render_target("rt").source,
            TextureSource::RenderTarget
        );
    }
}

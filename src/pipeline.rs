//! Pipeline descriptions and the keys derived from them
//!
//! A [`PipelineUid`] describes the fixed-function half of a draw: vertex
//! layout, topology, culling, blending and depth state. Shaders and pipeline
//! objects are cached per UID, combined with the sampler slots a material
//! actually binds.

use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Color(u8),
    TexCoord(u8),
    BlendIndices,
    BlendWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
    Unorm8x4,
    Uint8x4,
}

impl VertexFormat {
    pub const fn size(self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
            Self::Unorm8x4 | Self::Uint8x4 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Layout of one interleaved vertex stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexDeclaration {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexDeclaration {
    /// Builds a tightly packed declaration from attributes in stream order
    pub fn packed(attributes: &[(VertexSemantic, VertexFormat)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(semantic, format)| {
                let attribute = VertexAttribute {
                    semantic,
                    format,
                    offset,
                };
                offset += format.size();
                attribute
            })
            .collect();
        Self {
            stride: offset,
            attributes,
        }
    }

    pub fn has_semantic(&self, semantic: VertexSemantic) -> bool {
        self.attributes.iter().any(|a| a.semantic == semantic)
    }
}

/// Type of primitive to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Opaque,
    AlphaBlend,
    Additive,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    #[default]
    LessEqual,
    Greater,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthState {
    pub test_enabled: bool,
    pub write_enabled: bool,
    pub compare: CompareFunction,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enabled: true,
            write_enabled: true,
            compare: CompareFunction::LessEqual,
        }
    }
}

/// Complete fixed-function description of one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineUid {
    pub vertex_declaration: VertexDeclaration,
    pub primitive: PrimitiveType,
    pub cull_mode: CullMode,
    pub blend: BlendMode,
    pub depth: DepthState,
}

impl PipelineUid {
    /// Same state, different geometry. Mesh chunks use this to derive their
    /// own key from the one the renderer asked for.
    pub fn with_geometry(&self, declaration: &VertexDeclaration, primitive: PrimitiveType) -> Self {
        Self {
            vertex_declaration: declaration.clone(),
            primitive,
            ..self.clone()
        }
    }

    pub fn hash_key(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Shader permutation requested by a material
///
/// One flag per sampler slot; a set flag means a real texture is bound there
/// and the shader is compiled with `HAS_SAMPLER_<n>` defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderVariant {
    pub uid: PipelineUid,
    pub has_sampler: Vec<bool>,
}

impl ShaderVariant {
    pub fn new(uid: PipelineUid, has_sampler: Vec<bool>) -> Self {
        Self { uid, has_sampler }
    }

    /// Pipeline description hashed together with the per-slot flags
    pub fn key(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.uid.hash(&mut hasher);
        for (slot, bound) in self.has_sampler.iter().enumerate() {
            if *bound {
                slot.hash(&mut hasher);
            }
        }
        self.has_sampler.len().hash(&mut hasher);
        hasher.finish()
    }

    pub fn defines(&self) -> Vec<String> {
        self.has_sampler
            .iter()
            .enumerate()
            .filter(|(_, bound)| **bound)
            .map(|(slot, _)| format!("HAS_SAMPLER_{slot}"))
            .collect()
    }
}

//! GPU abstraction layer for backend-agnostic resource creation
//!
//! This module provides the traits and value types the resource pipeline
//! needs from a graphics backend: textures, shader stages, pipelines and
//! plain buffers. Everything else about the backend stays outside the crate.

pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

use crate::pipeline::PipelineUid;

/// Error type for GPU operations
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Buffer upload failed: {0}")]
    UploadFailed(String),

    #[error("Texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("{stage:?} shader compilation failed: {message}")]
    ShaderCompilationFailed { stage: ShaderStage, message: String },

    #[error("Pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),
}

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform buffer
    Uniform,
}

/// Texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GpuTextureFormat {
    /// RGBA 8-bit with sRGB color space
    Rgba8Srgb,
    /// RGBA 8-bit unorm
    Rgba8Unorm,
    /// BGRA 8-bit unorm, the usual swapchain format
    Bgra8Unorm,
    /// RGBA 16-bit float
    Rgba16Float,
    /// Single channel 8-bit
    R8Unorm,
    /// Depth 32-bit float
    Depth32Float,
    /// Depth 24 + Stencil 8
    Depth24Stencil8,
}

impl GpuTextureFormat {
    /// Size of one texel in bytes
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::R8Unorm => 1,
            Self::Rgba8Srgb
            | Self::Rgba8Unorm
            | Self::Bgra8Unorm
            | Self::Depth32Float
            | Self::Depth24Stencil8 => 4,
            Self::Rgba16Float => 8,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24Stencil8)
    }
}

/// Dimensionality of a texture as seen by a shader sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureKind {
    #[default]
    Texture2D,
    Texture2DArray,
    Cubemap,
}

/// How a texture is going to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureUsage {
    /// Sampled in shaders, filled by uploads
    #[default]
    Sampled,
    /// Rendered into and sampled afterwards
    RenderTarget,
}

/// Texture descriptor for creation
///
/// Also the key of the texture pool: two textures with equal descriptors
/// are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextureDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Array layers (6 for a cubemap)
    pub layers: u32,
    /// Number of mip levels (1 = no mipmaps)
    pub mip_levels: u32,
    /// Texture format
    pub format: GpuTextureFormat,
    /// Sampler-visible dimensionality
    pub kind: TextureKind,
    /// Intended usage
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            layers: 1,
            mip_levels: 1,
            format: GpuTextureFormat::Rgba8Unorm,
            kind: TextureKind::Texture2D,
            usage: TextureUsage::Sampled,
        }
    }
}

impl TextureDescriptor {
    /// Dimensions of a mip level, clamped to 1
    pub fn level_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Approximate GPU footprint of the whole texture
    pub fn size_bytes(&self) -> usize {
        (0..self.mip_levels)
            .map(|level| {
                let (w, h) = self.level_extent(level);
                w as usize * h as usize * self.format.bytes_per_pixel()
            })
            .sum::<usize>()
            * self.layers as usize
    }
}

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
}

/// Backend features that change how shaders are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpuCapabilities {
    pub geometry_shaders: bool,
    pub dual_source_blend: bool,
    pub max_texture_size: u32,
}

impl Default for GpuCapabilities {
    fn default() -> Self {
        Self {
            geometry_shaders: true,
            dual_source_blend: true,
            max_texture_size: 16384,
        }
    }
}

/// Everything needed to build a pipeline object
#[derive(Debug, Clone)]
pub struct PipelineDescriptor<S> {
    pub vertex_shader: S,
    pub pixel_shader: S,
    pub geometry_shader: Option<S>,
    pub uid: PipelineUid,
    /// Number of sampler slots bound while drawing
    pub sampler_count: usize,
}

/// Textures created by a backend must report the descriptor they were
/// created with, so the pool can file them back under the right key.
pub trait GpuTexture {
    fn descriptor(&self) -> &TextureDescriptor;
}

/// Core GPU device trait for backend-agnostic operations
///
/// Handles returned by the device are cheap to clone and shared between the
/// render thread and worker threads.
///
/// # Example
/// ```ignore
/// let gpu = MockGpu::new();
/// let texture = gpu.create_texture(&TextureDescriptor::default())?;
/// gpu.upload_texture(&texture, 0, 0, &[255, 255, 255, 255])?;
/// ```
pub trait GpuDevice: Send + Sync + Clone + Debug + 'static {
    /// Buffer type for this GPU backend
    type Buffer: Clone + Send + Sync + Debug + 'static;

    /// Texture type for this GPU backend
    type Texture: GpuTexture + Clone + Send + Sync + Debug + 'static;

    /// Compiled shader stage
    type Shader: Clone + Send + Sync + Debug + 'static;

    /// Linked pipeline object
    type Pipeline: Clone + Send + Sync + Debug + 'static;

    /// Allocate a GPU buffer
    ///
    /// # Arguments
    /// * `size` - Size in bytes
    /// * `usage` - How the buffer will be used
    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer>;

    /// Upload data to a buffer
    ///
    /// # Arguments
    /// * `buffer` - Target buffer
    /// * `offset` - Byte offset into the buffer
    /// * `data` - Data to upload
    fn upload_buffer_data(
        &self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> GpuResult<()>;

    /// Create an empty texture
    fn create_texture(&self, desc: &TextureDescriptor) -> GpuResult<Self::Texture>;

    /// Upload one mip level of one array layer
    fn upload_texture(
        &self,
        texture: &Self::Texture,
        level: u32,
        layer: u32,
        data: &[u8],
    ) -> GpuResult<()>;

    /// Compile a single shader stage
    fn create_shader_from_source(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> GpuResult<Self::Shader>;

    /// Link compiled stages and fixed-function state into a pipeline
    fn create_pipeline(
        &self,
        desc: &PipelineDescriptor<Self::Shader>,
    ) -> GpuResult<Self::Pipeline>;

    /// Destroy a buffer (optional cleanup)
    fn destroy_buffer(&self, _buffer: Self::Buffer) {
        // Default: let Drop handle it
    }

    /// Destroy a texture (optional cleanup)
    fn destroy_texture(&self, _texture: Self::Texture) {
        // Default: let Drop handle it
    }

    /// Format of the color buffer currently presented
    fn screen_color_format(&self) -> GpuTextureFormat {
        GpuTextureFormat::Bgra8Unorm
    }

    /// Format of the depth buffer currently presented
    fn screen_depth_format(&self) -> GpuTextureFormat {
        GpuTextureFormat::Depth32Float
    }

    fn capabilities(&self) -> GpuCapabilities {
        GpuCapabilities::default()
    }

    /// Get the name of this GPU backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

// Re-export implementations
pub use mock::MockGpu;

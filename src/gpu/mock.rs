//! Mock GPU implementation for testing
//!
//! Provides a mock GPU that stores data in memory for testing
//! without requiring actual GPU hardware.

use super::{
    BufferUsage, GpuCapabilities, GpuDevice, GpuError, GpuResult, GpuTexture, GpuTextureFormat,
    PipelineDescriptor, ShaderStage, TextureDescriptor,
};
use crate::pipeline::PipelineUid;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Counter for generating unique object IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Mock GPU device for testing
///
/// This implementation stores all data in memory and can be used
/// for unit tests without requiring actual GPU hardware. Shader sources that
/// are empty or contain an `#error` line fail to compile.
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    allocated_bytes: Arc<AtomicU64>,
    textures_created: Arc<AtomicU64>,
    shaders_compiled: Arc<AtomicU64>,
    pipelines_created: Arc<AtomicU64>,
    fail_pipelines: Arc<AtomicBool>,
    capabilities: Arc<RwLock<GpuCapabilities>>,
}

impl MockGpu {
    /// Create a new mock GPU device
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total allocated memory (for testing)
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// Number of textures constructed so far; pooled reuse does not count
    pub fn textures_created(&self) -> u64 {
        self.textures_created.load(Ordering::Relaxed)
    }

    pub fn shaders_compiled(&self) -> u64 {
        self.shaders_compiled.load(Ordering::Relaxed)
    }

    pub fn pipelines_created(&self) -> u64 {
        self.pipelines_created.load(Ordering::Relaxed)
    }

    /// Make every following `create_pipeline` call fail
    pub fn set_fail_pipelines(&self, fail: bool) {
        self.fail_pipelines.store(fail, Ordering::SeqCst);
    }

    /// Change the reported capabilities, as a backend switch would
    pub fn set_capabilities(&self, capabilities: GpuCapabilities) {
        *self.capabilities.write() = capabilities;
    }
}

/// Mock buffer that stores data in memory
#[derive(Clone, Debug)]
pub struct MockBuffer {
    /// Unique identifier
    pub id: u64,
    /// Buffer data
    pub data: Arc<RwLock<Vec<u8>>>,
    /// Buffer usage
    pub usage: BufferUsage,
}

impl MockBuffer {
    /// Create a new mock buffer
    pub fn new(size: usize, usage: BufferUsage) -> Self {
        Self {
            id: next_id(),
            data: Arc::new(RwLock::new(vec![0u8; size])),
            usage,
        }
    }

    /// Get the size of the buffer
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    /// Read buffer data
    pub fn read_data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

/// Mock texture that keeps every uploaded level in memory
#[derive(Clone, Debug)]
pub struct MockTexture {
    /// Unique identifier
    pub id: u64,
    /// Creation parameters
    pub descriptor: TextureDescriptor,
    /// Uploaded texel data keyed by `(level, layer)`
    pub levels: Arc<RwLock<HashMap<(u32, u32), Vec<u8>>>>,
}

impl MockTexture {
    /// Create a new mock texture
    pub fn new(desc: &TextureDescriptor) -> Self {
        Self {
            id: next_id(),
            descriptor: desc.clone(),
            levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Texel data previously uploaded to `(level, layer)`
    pub fn level_data(&self, level: u32, layer: u32) -> Option<Vec<u8>> {
        self.levels.read().get(&(level, layer)).cloned()
    }
}

impl GpuTexture for MockTexture {
    fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }
}

/// Mock compiled shader stage
#[derive(Clone, Debug)]
pub struct MockShader {
    pub id: u64,
    pub stage: ShaderStage,
    pub source: Arc<str>,
}

/// Mock pipeline object
#[derive(Clone, Debug)]
pub struct MockPipeline {
    pub id: u64,
    pub uid: PipelineUid,
    pub vertex_shader: u64,
    pub pixel_shader: u64,
    pub geometry_shader: Option<u64>,
    pub sampler_count: usize,
}

impl GpuDevice for MockGpu {
    type Buffer = MockBuffer;
    type Texture = MockTexture;
    type Shader = MockShader;
    type Pipeline = MockPipeline;

    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer> {
        if size == 0 {
            return Err(GpuError::InvalidSize(size));
        }

        self.allocated_bytes
            .fetch_add(size as u64, Ordering::Relaxed);
        Ok(MockBuffer::new(size, usage))
    }

    fn upload_buffer_data(
        &self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> GpuResult<()> {
        let mut buf_data = buffer.data.write();

        if offset + data.len() > buf_data.len() {
            return Err(GpuError::UploadFailed(format!(
                "Data exceeds buffer size: offset={}, data_len={}, buffer_size={}",
                offset,
                data.len(),
                buf_data.len()
            )));
        }

        buf_data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuResult<Self::Texture> {
        if desc.width == 0 || desc.height == 0 || desc.layers == 0 || desc.mip_levels == 0 {
            return Err(GpuError::TextureCreationFailed(
                "Invalid texture dimensions".to_string(),
            ));
        }

        self.allocated_bytes
            .fetch_add(desc.size_bytes() as u64, Ordering::Relaxed);
        self.textures_created.fetch_add(1, Ordering::Relaxed);

        Ok(MockTexture::new(desc))
    }

    fn upload_texture(
        &self,
        texture: &Self::Texture,
        level: u32,
        layer: u32,
        data: &[u8],
    ) -> GpuResult<()> {
        let desc = &texture.descriptor;
        if level >= desc.mip_levels || layer >= desc.layers {
            return Err(GpuError::UploadFailed(format!(
                "Level {level} / layer {layer} outside texture {}x{} ({} levels, {} layers)",
                desc.width, desc.height, desc.mip_levels, desc.layers
            )));
        }

        let (width, height) = desc.level_extent(level);
        let expected = width as usize * height as usize * desc.format.bytes_per_pixel();
        if data.len() != expected {
            return Err(GpuError::UploadFailed(format!(
                "Level {level} expects {expected} bytes, got {}",
                data.len()
            )));
        }

        texture.levels.write().insert((level, layer), data.to_vec());
        Ok(())
    }

    fn create_shader_from_source(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> GpuResult<Self::Shader> {
        if source.trim().is_empty() {
            return Err(GpuError::ShaderCompilationFailed {
                stage,
                message: "empty source".to_string(),
            });
        }
        if let Some(line) = source.lines().find(|l| l.trim_start().starts_with("#error")) {
            return Err(GpuError::ShaderCompilationFailed {
                stage,
                message: line.trim().to_string(),
            });
        }

        self.shaders_compiled.fetch_add(1, Ordering::Relaxed);
        Ok(MockShader {
            id: next_id(),
            stage,
            source: Arc::from(source),
        })
    }

    fn create_pipeline(
        &self,
        desc: &PipelineDescriptor<Self::Shader>,
    ) -> GpuResult<Self::Pipeline> {
        if self.fail_pipelines.load(Ordering::SeqCst) {
            return Err(GpuError::PipelineCreationFailed(
                "pipeline creation disabled".to_string(),
            ));
        }
        if desc.vertex_shader.stage != ShaderStage::Vertex
            || desc.pixel_shader.stage != ShaderStage::Pixel
        {
            return Err(GpuError::PipelineCreationFailed(
                "stage mismatch".to_string(),
            ));
        }

        self.pipelines_created.fetch_add(1, Ordering::Relaxed);
        Ok(MockPipeline {
            id: next_id(),
            uid: desc.uid.clone(),
            vertex_shader: desc.vertex_shader.id,
            pixel_shader: desc.pixel_shader.id,
            geometry_shader: desc.geometry_shader.as_ref().map(|s| s.id),
            sampler_count: desc.sampler_count,
        })
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        let size = buffer.size() as u64;
        self.allocated_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    fn destroy_texture(&self, texture: Self::Texture) {
        let size = texture.descriptor.size_bytes() as u64;
        self.allocated_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    fn screen_color_format(&self) -> GpuTextureFormat {
        GpuTextureFormat::Bgra8Unorm
    }

    fn screen_depth_format(&self) -> GpuTextureFormat {
        GpuTextureFormat::Depth24Stencil8
    }

    fn capabilities(&self) -> GpuCapabilities {
        *self.capabilities.read()
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

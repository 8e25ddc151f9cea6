//! Texture pool for recycling GPU textures across reloads
//!
//! Textures are filed by their [`TextureDescriptor`]; any two textures with
//! the same descriptor are interchangeable. Reuse is LIFO per descriptor.

use std::collections::HashMap;

use crate::gpu::{GpuDevice, GpuResult, GpuTexture, TextureDescriptor};

/// Free list of GPU textures keyed by descriptor
#[derive(Debug)]
pub struct TexturePool<G: GpuDevice> {
    free: HashMap<TextureDescriptor, Vec<G::Texture>>,
    free_count: usize,
}

impl<G: GpuDevice> Default for TexturePool<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GpuDevice> TexturePool<G> {
    pub fn new() -> Self {
        Self {
            free: HashMap::new(),
            free_count: 0,
        }
    }

    /// Pop a free texture matching `desc`, or create a new one on `gpu`
    pub fn allocate_texture(&mut self, gpu: &G, desc: &TextureDescriptor) -> GpuResult<G::Texture> {
        if let Some(texture) = self.free.get_mut(desc).and_then(Vec::pop) {
            self.free_count -= 1;
            return Ok(texture);
        }
        log::debug!(
            "Creating {}x{} {:?} texture for the pool",
            desc.width,
            desc.height,
            desc.format
        );
        gpu.create_texture(desc)
    }

    /// Give a texture back; it is filed under its own descriptor
    pub fn release_texture(&mut self, texture: G::Texture) {
        let desc = texture.descriptor().clone();
        self.free.entry(desc).or_default().push(texture);
        self.free_count += 1;
    }

    /// Number of free textures for one descriptor
    pub fn free_count_for(&self, desc: &TextureDescriptor) -> usize {
        self.free.get(desc).map_or(0, Vec::len)
    }

    /// Total number of free textures
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Destroy every free texture
    pub fn clear(&mut self, gpu: &G) {
        for texture in self.free.drain().flat_map(|(_, textures)| textures) {
            gpu.destroy_texture(texture);
        }
        self.free_count = 0;
    }
}

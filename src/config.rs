//! Runtime configuration

use crate::gpu::GpuCapabilities;

/// Default resident memory budget for loaded asset data (512 MiB)
pub const DEFAULT_MEMORY_BUDGET: usize = 512 * 1024 * 1024;

/// Configuration for the asset cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Bytes of decoded asset data kept resident before eviction kicks in
    pub memory_budget_bytes: usize,
    /// Upper bound on loads running on the spawner at once
    pub max_loads_in_flight: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
            max_loads_in_flight: 8,
        }
    }
}

impl CacheConfig {
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    pub fn with_max_loads_in_flight(mut self, loads: usize) -> Self {
        self.max_loads_in_flight = loads.max(1);
        self
    }
}

/// Host features baked into generated shader source
///
/// A change invalidates the shaders compiled against the old value but keeps
/// their resource ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderHostConfig {
    pub geometry_shaders: bool,
    pub dual_source_blend: bool,
}

impl Default for ShaderHostConfig {
    fn default() -> Self {
        Self::from_capabilities(&GpuCapabilities::default())
    }
}

impl ShaderHostConfig {
    pub fn from_capabilities(capabilities: &GpuCapabilities) -> Self {
        Self {
            geometry_shaders: capabilities.geometry_shaders,
            dual_source_blend: capabilities.dual_source_blend,
        }
    }

    /// Preprocessor lines prepended to every stage
    pub fn defines(&self) -> String {
        format!(
            "#define HOST_GEOMETRY_SHADERS {}\n#define HOST_DUAL_SOURCE_BLEND {}\n",
            u8::from(self.geometry_shaders),
            u8::from(self.dual_source_blend)
        )
    }
}

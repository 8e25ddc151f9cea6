//! Error types for archetype_resource

use thiserror::Error;

use crate::library::{AssetId, AssetKind};

/// Main error type for cache and resource operations
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("GPU error: {0}")]
    Gpu(#[from] crate::gpu::GpuError),

    #[error("Library error: {0}")]
    Library(#[from] crate::library::LibraryError),

    #[error("Asset {id} was registered as {registered:?}, requested as {requested:?}")]
    AssetTypeMismatch {
        id: AssetId,
        registered: AssetKind,
        requested: AssetKind,
    },
}

/// Result type alias for resource operations
pub type Result<T> = std::result::Result<T, ResourceError>;

//! Error types for leash_surface

use leash_core::SurfaceError;
use thiserror::Error;

/// Errors raised by the leash coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnimatorError {
    /// The animated surface was already destroyed
    #[error("cannot animate a destroyed surface")]
    Destroyed,

    /// The host has no surface to put under a leash
    #[error("host has no surface to animate")]
    NoSurface,

    /// The animation engine was dropped
    #[error("animation engine is no longer running")]
    EngineUnavailable,

    /// Leash allocation failed
    #[error("leash creation failed: {0}")]
    Surface(#[from] SurfaceError),
}

/// Errors raised while constructing a thumbnail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    /// The snapshot buffer has no pixels
    #[error("thumbnail buffer must be non-empty, got {width}x{height}")]
    EmptyBuffer { width: u32, height: u32 },

    /// The owner entity was dropped before the thumbnail was built
    #[error("owner entity is gone")]
    OwnerGone,

    /// Surface allocation failed
    #[error("thumbnail surface creation failed: {0}")]
    Surface(#[from] SurfaceError),
}

/// Result type for leash coordinator operations
pub type Result<T> = std::result::Result<T, AnimatorError>;

//! Error types for leash_core

use crate::surface::SurfaceId;
use thiserror::Error;

/// Errors raised by the surface tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The compositor refused to allocate another surface
    #[error("surface allocation failed: limit of {limit} surfaces reached")]
    Exhausted { limit: usize },

    /// A builder named a parent that no longer exists
    #[error("parent surface {0:?} does not exist")]
    InvalidParent(SurfaceId),

    /// The surface was already released
    #[error("surface {0:?} does not exist")]
    Released(SurfaceId),

    /// A buffer with zero width or height
    #[error("buffer dimensions must be positive, got {width}x{height}")]
    EmptyBuffer { width: u32, height: u32 },

    /// Buffer dimensions whose byte length does not fit in memory
    #[error("buffer of {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },

    /// Buffer byte length does not match its dimensions
    #[error("buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// Buffers can only be attached to buffer surfaces
    #[error("surface {0:?} cannot hold a buffer")]
    NotABufferSurface(SurfaceId),
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for surface tree operations
pub type Result<T> = std::result::Result<T, SurfaceError>;

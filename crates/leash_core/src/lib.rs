//! Leash Core
//!
//! Foundational types for transient, leash-animated surfaces:
//!
//! - **Surfaces**: generational ids, creation requests, single-use pixel buffers
//! - **Transactions**: ordered mutation batches applied atomically
//! - **Compositor**: an in-process surface tree that applies batches
//! - **Owners**: the window entities that host transient surfaces
//! - **Configuration**: animation ceilings and speed multiplier, loaded from TOML
//!
//! # Example
//!
//! ```rust
//! use leash_core::{Compositor, SurfaceBuilder, Transaction};
//!
//! let compositor = Compositor::new();
//! let root = compositor.create_surface(SurfaceBuilder::new("root")).unwrap();
//!
//! let mut t = Transaction::new();
//! t.show(root).set_layer(root, 1);
//! compositor.apply(t);
//!
//! assert!(compositor.node(root).unwrap().visible);
//! ```

pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod owner;
pub mod surface;
pub mod transaction;

pub use compositor::{Compositor, CompositorStats, SurfaceTree, RELEASE_HISTORY};
pub use config::{LeashConfig, MAX_ANIMATION_DURATION_MS};
pub use error::{ConfigError, Result, SurfaceError};
pub use geometry::{Affine2D, Point, Size};
pub use owner::{OwnerEntity, OwnerWindow, PrimaryWindow};
pub use surface::{
    AttachedBuffer, PixelBuffer, PixelFormat, SurfaceBuilder, SurfaceId, SurfaceKind,
    SurfaceMetadata, SurfaceNode,
};
pub use transaction::{SurfaceOp, Transaction};

//! Leash Surfaces
//!
//! Transient thumbnail surfaces and the leash coordinator that animates them.
//!
//! A [`ThumbnailSurface`] shows a pixel snapshot standing in for an owner
//! window. Animating it creates a leash surface, moves the thumbnail under
//! the leash, and lets the [`AnimationEngine`](leash_animation::AnimationEngine)
//! drive the leash's transform. When the animation ends the thumbnail goes
//! back under its owner and the leash is removed.
//!
//! # Example
//!
//! ```rust
//! use leash_animation::{AnimationEngine, AnimationSpec};
//! use leash_core::{Compositor, LeashConfig, OwnerEntity, OwnerWindow, PixelBuffer, Transaction};
//! use leash_surface::ThumbnailSurface;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = LeashConfig::testing();
//! let compositor = Compositor::from_config(&config);
//! let engine = AnimationEngine::new(&config);
//! let owner: Arc<dyn OwnerEntity> = Arc::new(OwnerWindow::new(&compositor, "task", None).unwrap());
//!
//! let mut t = Transaction::new();
//! let buffer = PixelBuffer::solid(200, 100, [0, 0, 0, 255]).unwrap();
//! let mut thumb = ThumbnailSurface::new(&mut t, Arc::downgrade(&owner), buffer, engine.handle()).unwrap();
//! thumb.start_animation(&mut t, AnimationSpec::new(Duration::from_millis(300))).unwrap();
//! compositor.apply(t);
//!
//! for id in engine.dispatch(&compositor) {
//!     thumb.on_animation_finished(id);
//! }
//! assert!(!thumb.is_animating());
//! thumb.destroy();
//! ```

pub mod animator;
pub mod dump;
pub mod error;
pub mod thumbnail;

pub use animator::{
    Animatable, AnimationState, AnimationType, FinishListener, FinishReason, SurfaceAnimator,
};
pub use dump::{DumpField, DumpNode, DumpValue};
pub use error::{AnimatorError, Result, ThumbnailError};
pub use thumbnail::ThumbnailSurface;

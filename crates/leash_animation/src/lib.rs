//! Leash Animation Engine
//!
//! Timed transform animations for animation leashes.
//!
//! # Features
//!
//! - **Timing Specs**: duration, easing, and from/to leash transforms
//! - **Duration Policy**: platform ceiling plus a global speed multiplier
//! - **Background Sampling**: optional animation thread at a fixed frame rate
//! - **Single-Writer Dispatch**: frames reach the compositor only on the control thread
//! - **Synchronous Cancel**: nothing from a cancelled animation is delivered

pub mod easing;
pub mod engine;
pub mod timing;

pub use easing::Easing;
pub use engine::{AnimationEngine, AnimationId, EngineHandle, EngineMessage, WakeCallback};
pub use timing::{AnimationSpec, FrameSample, Interpolate, LeashTransform};
